diesel::table! {
    subjects (subject_id) {
        subject_id -> Text,
        project_id -> Text,
        condition -> Text,
        age -> Integer,
        sex -> Text,
        treatment -> Nullable<Text>,
        response -> Nullable<Text>,
    }
}

diesel::table! {
    samples (sample_id) {
        sample_id -> Text,
        subject_id -> Text,
        sample_type -> Text,
        time_from_treatment_start -> Integer,
        b_cell -> BigInt,
        cd8_t_cell -> BigInt,
        cd4_t_cell -> BigInt,
        nk_cell -> BigInt,
        monocyte -> BigInt,
    }
}

diesel::joinable!(samples -> subjects (subject_id));

diesel::allow_tables_to_appear_in_same_query!(samples, subjects);
