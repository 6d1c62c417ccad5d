// The shape the ORM strategy expects. Deployed tables may differ; see
// `probe`.

diesel::table! {
    teams (id) {
        id -> BigInt,
        team_number -> Integer,
        auto_score_coral -> Bool,
        auto_score_algae -> Bool,
        must_start_specific_position -> Bool,
        teleop_dealgifying -> Bool,
        starting_position -> Nullable<Text>,
        intake_preference -> Nullable<Text>,
        scoring_preference -> Nullable<Text>,
        drivetrain -> Nullable<Text>,
        coral_levels -> Text,
        robot_width -> Nullable<Double>,
        robot_length -> Nullable<Double>,
        robot_height -> Nullable<Double>,
        notes -> Text,
        image_url -> Nullable<Text>,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

diesel::table! {
    matches (id) {
        id -> BigInt,
        match_number -> Integer,
        team_number -> Integer,
        auto_score_coral -> Bool,
        auto_score_algae -> Bool,
        must_start_specific_position -> Bool,
        teleop_dealgifying -> Bool,
        starting_position -> Nullable<Text>,
        intake_preference -> Nullable<Text>,
        scoring_preference -> Nullable<Text>,
        drivetrain -> Nullable<Text>,
        coral_levels -> Text,
        notes -> Text,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}
