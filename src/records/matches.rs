use std::fmt;

use diesel::QueryableByName;
use diesel::sql_types::{Nullable, Text};
use serde::{Deserialize, Serialize};

use crate::canonical::{
    self, Fields, Payload, list::ListEncoding, materialize_choice,
    materialize_flag,
};
use crate::error::ValidationError;
use crate::records::team::{
    AUTO_SCORE_ALGAE, AUTO_SCORE_CORAL, CORAL_LEVELS, CREATED_AT, DRIVETRAIN,
    ID, INTAKE_PREFERENCE, MUST_START_SPECIFIC_POSITION, NOTES,
    SCORING_PREFERENCE, STARTING_POSITION, TEAM_NUMBER, TELEOP_DEALGIFYING,
    UPDATED_AT,
};
use crate::records::{Column, ColumnKind, Entity, Stored, TableDef};
use crate::strategy::SqlValue;

pub const MATCH_NUMBER: Column =
    Column::new("match_number", "matchNumber", ColumnKind::Key);

const COLUMNS: &[Column] = &[
    ID,
    MATCH_NUMBER,
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
    NOTES,
    CREATED_AT,
    UPDATED_AT,
];

#[derive(Serialize, Deserialize, Copy, Clone, PartialEq, Eq, Debug)]
#[serde(rename_all = "camelCase")]
pub struct MatchKey {
    pub match_number: i32,
    pub team_number: i32,
}

impl fmt::Display for MatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "match {} / team {}", self.match_number, self.team_number)
    }
}

/// What one team did in one match.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    pub match_number: i32,
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
    pub notes: String,
}

impl Match {
    pub fn new(key: MatchKey) -> Self {
        Self {
            match_number: key.match_number,
            team_number: key.team_number,
            auto_score_coral: false,
            auto_score_algae: false,
            must_start_specific_position: false,
            teleop_dealgifying: false,
            starting_position: None,
            intake_preference: None,
            scoring_preference: None,
            drivetrain: None,
            coral_levels: Vec::new(),
            notes: String::new(),
        }
    }
}

#[derive(QueryableByName, Debug)]
pub struct MatchRow {
    #[diesel(sql_type = Nullable<Text>)]
    pub id: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    pub match_number: Option<String>,
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
    pub notes: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    pub created_at: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    pub updated_at: Option<String>,
}

impl Entity for Match {
    type Key = MatchKey;
    type Row = MatchRow;

    const TABLE: TableDef = TableDef {
        name: "matches",
        columns: COLUMNS,
        list_column: CORAL_LEVELS.name,
    };

    fn key(&self) -> MatchKey {
        MatchKey {
            match_number: self.match_number,
            team_number: self.team_number,
        }
    }

    fn canonicalize(payload: &Payload) -> Result<Self, ValidationError> {
        let fields = Fields::new(payload);
        Ok(Match {
            match_number: fields.key(&MATCH_NUMBER)?,
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
            notes: fields.text(&NOTES),
        })
    }

    fn key_values(key: MatchKey) -> Vec<(&'static str, SqlValue)> {
        vec![
            (MATCH_NUMBER.name, SqlValue::Int(key.match_number)),
            (TEAM_NUMBER.name, SqlValue::Int(key.team_number)),
        ]
    }

    fn attribute_values(
        &self,
        encoding: ListEncoding,
    ) -> Vec<(&'static str, SqlValue)> {
        vec![
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
            (NOTES.name, SqlValue::Text(Some(self.notes.clone()))),
        ]
    }

    fn materialize(row: MatchRow) -> Stored<Match> {
        Stored {
            id: canonical::materialize_id(row.id.as_deref()),
            record: Match {
                match_number: canonical::materialize_key(
                    MATCH_NUMBER.name,
                    row.match_number.as_deref(),
                ),
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
                notes: row.notes.unwrap_or_default(),
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
