use diesel::QueryableByName;
use diesel::sql_types::{Nullable, Text};
use serde::{Deserialize, Serialize};

use crate::canonical::{
    self, Fields, Payload, list::ListEncoding, materialize_choice,
    materialize_flag, materialize_number,
};
use crate::error::ValidationError;
use crate::records::{Column, ColumnKind, Entity, Stored, TableDef};
use crate::strategy::SqlValue;

pub const ID: Column = Column::new("id", "id", ColumnKind::Id);
pub const TEAM_NUMBER: Column =
    Column::new("team_number", "teamNumber", ColumnKind::Key);
pub const AUTO_SCORE_CORAL: Column =
    Column::new("auto_score_coral", "autoScoreCoral", ColumnKind::Flag);
pub const AUTO_SCORE_ALGAE: Column =
    Column::new("auto_score_algae", "autoScoreAlgae", ColumnKind::Flag);
pub const MUST_START_SPECIFIC_POSITION: Column = Column::new(
    "must_start_specific_position",
    "mustStartSpecificPosition",
    ColumnKind::Flag,
);
pub const TELEOP_DEALGIFYING: Column =
    Column::new("teleop_dealgifying", "teleopDealgifying", ColumnKind::Flag);
pub const STARTING_POSITION: Column =
    Column::new("starting_position", "startingPosition", ColumnKind::Choice);
pub const INTAKE_PREFERENCE: Column =
    Column::new("intake_preference", "intakePreference", ColumnKind::Choice);
pub const SCORING_PREFERENCE: Column =
    Column::new("scoring_preference", "scoringPreference", ColumnKind::Choice);
pub const DRIVETRAIN: Column =
    Column::new("drivetrain", "drivetrain", ColumnKind::Choice);
pub const CORAL_LEVELS: Column =
    Column::new("coral_levels", "coralLevels", ColumnKind::List);
pub const ROBOT_WIDTH: Column =
    Column::new("robot_width", "robotWidth", ColumnKind::Number);
pub const ROBOT_LENGTH: Column =
    Column::new("robot_length", "robotLength", ColumnKind::Number);
pub const ROBOT_HEIGHT: Column =
    Column::new("robot_height", "robotHeight", ColumnKind::Number);
pub const NOTES: Column = Column::new("notes", "notes", ColumnKind::Text);
pub const IMAGE_URL: Column =
    Column::new("image_url", "imageUrl", ColumnKind::Image);
pub const CREATED_AT: Column =
    Column::new("created_at", "createdAt", ColumnKind::Timestamp);
pub const UPDATED_AT: Column =
    Column::new("updated_at", "updatedAt", ColumnKind::Timestamp);

const COLUMNS: &[Column] = &[
    ID,
    TEAM_NUMBER,
    AUTO_SCORE_CORAL,
    AUTO_SCORE_ALGAE,
    MUST_START_SPECIFIC_POSITION,
    TELEOP_DEALGIFYING,
    STARTING_POSITION,
    INTAKE_PREFERENCE,
    SCORING_PREFERENCE,
    DRIVETRAIN,
    CORAL_LEVELS,
    ROBOT_WIDTH,
    ROBOT_LENGTH,
    ROBOT_HEIGHT,
    NOTES,
    IMAGE_URL,
    CREATED_AT,
    UPDATED_AT,
];

/// Pit scouting observations about a single team.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub team_number: i32,
    pub auto_score_coral: bool,
    pub auto_score_algae: bool,
    pub must_start_specific_position: bool,
    pub teleop_dealgifying: bool,
    pub starting_position: Option<String>,
    pub intake_preference: Option<String>,
    pub scoring_preference: Option<String>,
    pub drivetrain: Option<String>,
    pub coral_levels: Vec<String>,
    pub robot_width: Option<f64>,
    pub robot_length: Option<f64>,
    pub robot_height: Option<f64>,
    pub notes: String,
    /// Set by the image upload flow; upserts without an image keep the
    /// stored one.
    pub image_url: Option<String>,
}

impl Team {
    /// A team with nothing recorded about it yet.
    pub fn new(team_number: i32) -> Self {
        Self {
            team_number,
            auto_score_coral: false,
            auto_score_algae: false,
            must_start_specific_position: false,
            teleop_dealgifying: false,
            starting_position: None,
            intake_preference: None,
            scoring_preference: None,
            drivetrain: None,
            coral_levels: Vec::new(),
            robot_width: None,
            robot_length: None,
            robot_height: None,
            notes: String::new(),
            image_url: None,
        }
    }
}

#[derive(QueryableByName, Debug)]
pub struct TeamRow {
    #[diesel(sql_type = Nullable<Text>)]
    pub id: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    pub team_number: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    pub auto_score_coral: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    pub auto_score_algae: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    pub must_start_specific_position: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    pub teleop_dealgifying: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    pub starting_position: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    pub intake_preference: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    pub scoring_preference: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    pub drivetrain: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    pub coral_levels: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    pub robot_width: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    pub robot_length: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    pub robot_height: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    pub notes: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    pub image_url: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    pub created_at: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    pub updated_at: Option<String>,
}

impl Entity for Team {
    type Key = i32;
    type Row = TeamRow;

    const TABLE: TableDef = TableDef {
        name: "teams",
        columns: COLUMNS,
        list_column: CORAL_LEVELS.name,
    };

    fn key(&self) -> i32 {
        self.team_number
    }

    fn canonicalize(payload: &Payload) -> Result<Self, ValidationError> {
        let fields = Fields::new(payload);
        Ok(Team {
            team_number: fields.key(&TEAM_NUMBER)?,
            auto_score_coral: fields.flag(&AUTO_SCORE_CORAL),
            auto_score_algae: fields.flag(&AUTO_SCORE_ALGAE),
            must_start_specific_position: fields
                .flag(&MUST_START_SPECIFIC_POSITION),
            teleop_dealgifying: fields.flag(&TELEOP_DEALGIFYING),
            starting_position: fields.choice(&STARTING_POSITION),
            intake_preference: fields.choice(&INTAKE_PREFERENCE),
            scoring_preference: fields.choice(&SCORING_PREFERENCE),
            drivetrain: fields.choice(&DRIVETRAIN),
            coral_levels: fields.list(&CORAL_LEVELS),
            robot_width: fields.number(&ROBOT_WIDTH)?,
            robot_length: fields.number(&ROBOT_LENGTH)?,
            robot_height: fields.number(&ROBOT_HEIGHT)?,
            notes: fields.text(&NOTES),
            image_url: fields.choice(&IMAGE_URL),
        })
    }

    fn key_values(key: i32) -> Vec<(&'static str, SqlValue)> {
        vec![(TEAM_NUMBER.name, SqlValue::Int(key))]
    }

    fn attribute_values(
        &self,
        encoding: ListEncoding,
    ) -> Vec<(&'static str, SqlValue)> {
        let mut values = vec![
            (AUTO_SCORE_CORAL.name, SqlValue::Bool(self.auto_score_coral)),
            (AUTO_SCORE_ALGAE.name, SqlValue::Bool(self.auto_score_algae)),
            (
                MUST_START_SPECIFIC_POSITION.name,
                SqlValue::Bool(self.must_start_specific_position),
            ),
            (TELEOP_DEALGIFYING.name, SqlValue::Bool(self.teleop_dealgifying)),
            (
                STARTING_POSITION.name,
                SqlValue::Text(self.starting_position.clone()),
            ),
            (
                INTAKE_PREFERENCE.name,
                SqlValue::Text(self.intake_preference.clone()),
            ),
            (
                SCORING_PREFERENCE.name,
                SqlValue::Text(self.scoring_preference.clone()),
            ),
            (DRIVETRAIN.name, SqlValue::Text(self.drivetrain.clone())),
            (
                CORAL_LEVELS.name,
                SqlValue::Text(Some(encoding.encode(&self.coral_levels))),
            ),
            (ROBOT_WIDTH.name, SqlValue::Real(self.robot_width)),
            (ROBOT_LENGTH.name, SqlValue::Real(self.robot_length)),
            (ROBOT_HEIGHT.name, SqlValue::Real(self.robot_height)),
            (NOTES.name, SqlValue::Text(Some(self.notes.clone()))),
        ];
        if let Some(image_url) = &self.image_url {
            values.push((IMAGE_URL.name, SqlValue::Text(Some(image_url.clone()))));
        }
        values
    }

    fn materialize(row: TeamRow) -> Stored<Team> {
        Stored {
            id: canonical::materialize_id(row.id.as_deref()),
            record: Team {
                team_number: canonical::materialize_key(
                    TEAM_NUMBER.name,
                    row.team_number.as_deref(),
                ),
                auto_score_coral: materialize_flag(row.auto_score_coral.as_deref()),
                auto_score_algae: materialize_flag(row.auto_score_algae.as_deref()),
                must_start_specific_position: materialize_flag(
                    row.must_start_specific_position.as_deref(),
                ),
                teleop_dealgifying: materialize_flag(
                    row.teleop_dealgifying.as_deref(),
                ),
                starting_position: materialize_choice(row.starting_position),
                intake_preference: materialize_choice(row.intake_preference),
                scoring_preference: materialize_choice(row.scoring_preference),
                drivetrain: materialize_choice(row.drivetrain),
                coral_levels: canonical::materialize_list(
                    CORAL_LEVELS.name,
                    row.coral_levels.as_deref(),
                ),
                robot_width: materialize_number(
                    ROBOT_WIDTH.name,
                    row.robot_width.as_deref(),
                ),
                robot_length: materialize_number(
                    ROBOT_LENGTH.name,
                    row.robot_length.as_deref(),
                ),
                robot_height: materialize_number(
                    ROBOT_HEIGHT.name,
                    row.robot_height.as_deref(),
                ),
                notes: row.notes.unwrap_or_default(),
                image_url: materialize_choice(row.image_url),
            },
            created_at: canonical::materialize_timestamp(
                CREATED_AT.name,
                row.created_at.as_deref(),
            ),
            updated_at: canonical::materialize_timestamp(
                UPDATED_AT.name,
                row.updated_at.as_deref(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn payload(value: serde_json::Value) -> Payload {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn canonicalizes_loose_payload() {
        let team = Team::canonicalize(&payload(json!({
            "teamNumber": "1334",
            "autoScoreCoral": "1",
            "autoScoreAlgae": 0,
            "must_start_specific_position": "TRUE",
            "startingPosition": " center ",
            "drivetrain": "",
            "coralLevels": "{\"L2\",\"L3\"}",
            "robotWidth": "27.5",
            "robotLength": 30,
            "robotHeight": "",
            "notes": "fast cycler",
        })))
        .unwrap();

        assert_eq!(team.team_number, 1334);
        assert!(team.auto_score_coral);
        assert!(!team.auto_score_algae);
        assert!(team.must_start_specific_position);
        assert!(!team.teleop_dealgifying);
        assert_eq!(team.starting_position.as_deref(), Some("center"));
        assert_eq!(team.drivetrain, None);
        assert_eq!(team.coral_levels, vec!["L2", "L3"]);
        assert_eq!(team.robot_width, Some(27.5));
        assert_eq!(team.robot_length, Some(30.0));
        assert_eq!(team.robot_height, None);
        assert_eq!(team.notes, "fast cycler");
        assert_eq!(team.image_url, None);
    }

    #[test]
    fn bad_dimension_is_fatal() {
        let err = Team::canonicalize(&payload(json!({
            "teamNumber": 1334,
            "robotWidth": "about thirty",
        })))
        .unwrap_err();
        assert!(matches!(
            err,
            ValidationError::NotANumber { field: "robotWidth", .. }
        ));
    }

    #[test]
    fn missing_key_is_fatal() {
        let err = Team::canonicalize(&payload(json!({ "notes": "hi" })))
            .unwrap_err();
        assert_eq!(err, ValidationError::MissingKey { field: "teamNumber" });
    }

    #[test]
    fn image_is_only_written_when_present() {
        let mut team = Team::new(1334);
        let names = |team: &Team| {
            team.attribute_values(ListEncoding::Json)
                .into_iter()
                .map(|(name, _)| name)
                .collect::<Vec<_>>()
        };
        assert!(!names(&team).contains(&"image_url"));
        team.image_url = Some("/uploads/1334.png".to_string());
        assert!(names(&team).contains(&"image_url"));
    }

    #[test]
    fn materializes_text_row() {
        let stored = Team::materialize(TeamRow {
            id: Some("7".to_string()),
            team_number: Some("1334".to_string()),
            auto_score_coral: Some("1".to_string()),
            auto_score_algae: Some("0".to_string()),
            must_start_specific_position: None,
            teleop_dealgifying: Some("true".to_string()),
            starting_position: Some("left".to_string()),
            intake_preference: None,
            scoring_preference: Some("".to_string()),
            drivetrain: Some("swerve".to_string()),
            coral_levels: Some("{\"L1\",\"L4\"}".to_string()),
            robot_width: Some("27.5".to_string()),
            robot_length: Some("not a number".to_string()),
            robot_height: None,
            notes: None,
            image_url: None,
            created_at: Some("2025-03-01 10:00:00".to_string()),
            updated_at: None,
        });

        assert_eq!(stored.id, 7);
        assert_eq!(stored.record.team_number, 1334);
        assert!(stored.record.auto_score_coral);
        assert!(!stored.record.auto_score_algae);
        assert!(stored.record.teleop_dealgifying);
        assert_eq!(stored.record.scoring_preference, None);
        assert_eq!(stored.record.coral_levels, vec!["L1", "L4"]);
        assert_eq!(stored.record.robot_width, Some(27.5));
        assert_eq!(stored.record.robot_length, None);
        assert_eq!(stored.record.notes, "");
        assert!(stored.created_at.is_some());
        assert!(stored.updated_at.is_none());
    }
}
