//! The ORM strategy: diesel's query DSL over the tables declared in
//! [`crate::schema`]. It is the preferred path, and also the least tolerant
//! one. Any column the DSL expects but the table lacks, any NULL in a
//! non-null column, any list column not in the probed encoding, and any list
//! that encoding cannot hold exactly is an error, which sends the cascade on
//! to the raw strategies.

use chrono::NaiveDateTime;
use diesel::dsl::now;
use diesel::prelude::*;

use crate::canonical::list::{ListDecodeError, ListEncodeError, ListEncoding};
use crate::probe::SchemaInfo;
use crate::records::{Entity, Match, MatchKey, Stored, Team};
use crate::schema::{matches, teams};
use crate::strategy::{PersistenceStrategy, StrategyKind};

#[derive(Debug, Clone, Copy)]
pub struct Orm;

fn decode_list(
    encoding: ListEncoding,
    raw: &str,
) -> QueryResult<Vec<String>> {
    encoding.decode_strict(raw).map_err(|e: ListDecodeError| {
        diesel::result::Error::DeserializationError(Box::new(e))
    })
}

fn encode_list(
    encoding: ListEncoding,
    items: &[String],
) -> QueryResult<String> {
    encoding.encode_exact(items).map_err(|e: ListEncodeError| {
        diesel::result::Error::SerializationError(Box::new(e))
    })
}

fn read_back<T>(found: QueryResult<Option<T>>) -> QueryResult<T> {
    found?.ok_or(diesel::result::Error::NotFound)
}

#[derive(Queryable, Debug)]
struct TeamModel {
    id: i64,
    team_number: i32,
    auto_score_coral: bool,
    auto_score_algae: bool,
    must_start_specific_position: bool,
    teleop_dealgifying: bool,
    starting_position: Option<String>,
    intake_preference: Option<String>,
    scoring_preference: Option<String>,
    drivetrain: Option<String>,
    coral_levels: String,
    robot_width: Option<f64>,
    robot_length: Option<f64>,
    robot_height: Option<f64>,
    notes: String,
    image_url: Option<String>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

impl TeamModel {
    fn into_stored(self, encoding: ListEncoding) -> QueryResult<Stored<Team>> {
        Ok(Stored {
            id: self.id,
            record: Team {
                team_number: self.team_number,
                auto_score_coral: self.auto_score_coral,
                auto_score_algae: self.auto_score_algae,
                must_start_specific_position: self.must_start_specific_position,
                teleop_dealgifying: self.teleop_dealgifying,
                starting_position: self.starting_position,
                intake_preference: self.intake_preference,
                scoring_preference: self.scoring_preference,
                drivetrain: self.drivetrain,
                coral_levels: decode_list(encoding, &self.coral_levels)?,
                robot_width: self.robot_width,
                robot_length: self.robot_length,
                robot_height: self.robot_height,
                notes: self.notes,
                image_url: self.image_url,
            },
            created_at: Some(self.created_at),
            updated_at: Some(self.updated_at),
        })
    }
}

impl PersistenceStrategy<Team> for Orm {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Orm
    }

    fn find_by_key(
        &self,
        conn: &mut SqliteConnection,
        schema: &SchemaInfo,
        key: i32,
    ) -> QueryResult<Option<Stored<Team>>> {
        teams::table
            .filter(teams::team_number.eq(key))
            .first::<TeamModel>(conn)
            .optional()?
            .map(|model| model.into_stored(schema.list_column_type.encoding()))
            .transpose()
    }

    fn insert(
        &self,
        conn: &mut SqliteConnection,
        schema: &SchemaInfo,
        record: &Team,
    ) -> QueryResult<Stored<Team>> {
        let coral_levels =
            encode_list(schema.list_column_type.encoding(), &record.coral_levels)?;
        diesel::insert_into(teams::table)
            .values((
                teams::team_number.eq(record.team_number),
                teams::auto_score_coral.eq(record.auto_score_coral),
                teams::auto_score_algae.eq(record.auto_score_algae),
                teams::must_start_specific_position
                    .eq(record.must_start_specific_position),
                teams::teleop_dealgifying.eq(record.teleop_dealgifying),
                teams::starting_position.eq(record.starting_position.clone()),
                teams::intake_preference.eq(record.intake_preference.clone()),
                teams::scoring_preference.eq(record.scoring_preference.clone()),
                teams::drivetrain.eq(record.drivetrain.clone()),
                teams::coral_levels.eq(coral_levels),
                teams::robot_width.eq(record.robot_width),
                teams::robot_length.eq(record.robot_length),
                teams::robot_height.eq(record.robot_height),
                teams::notes.eq(&record.notes),
                teams::image_url.eq(record.image_url.clone()),
                teams::created_at.eq(now),
                teams::updated_at.eq(now),
            ))
            .execute(conn)?;

        read_back(PersistenceStrategy::<Team>::find_by_key(
            self,
            conn,
            schema,
            record.team_number,
        ))
    }

    fn update(
        &self,
        conn: &mut SqliteConnection,
        schema: &SchemaInfo,
        record: &Team,
    ) -> QueryResult<Stored<Team>> {
        let coral_levels =
            encode_list(schema.list_column_type.encoding(), &record.coral_levels)?;
        let changed = diesel::update(
            teams::table.filter(teams::team_number.eq(record.team_number)),
        )
        .set((
            teams::auto_score_coral.eq(record.auto_score_coral),
            teams::auto_score_algae.eq(record.auto_score_algae),
            teams::must_start_specific_position
                .eq(record.must_start_specific_position),
            teams::teleop_dealgifying.eq(record.teleop_dealgifying),
            teams::starting_position.eq(record.starting_position.clone()),
            teams::intake_preference.eq(record.intake_preference.clone()),
            teams::scoring_preference.eq(record.scoring_preference.clone()),
            teams::drivetrain.eq(record.drivetrain.clone()),
            teams::coral_levels.eq(coral_levels),
            teams::robot_width.eq(record.robot_width),
            teams::robot_length.eq(record.robot_length),
            teams::robot_height.eq(record.robot_height),
            teams::notes.eq(&record.notes),
            teams::updated_at.eq(now),
        ))
        .execute(conn)?;
        if changed == 0 {
            return Err(diesel::result::Error::NotFound);
        }

        if let Some(image_url) = &record.image_url {
            diesel::update(
                teams::table.filter(teams::team_number.eq(record.team_number)),
            )
            .set(teams::image_url.eq(image_url))
            .execute(conn)?;
        }

        read_back(PersistenceStrategy::<Team>::find_by_key(
            self,
            conn,
            schema,
            record.team_number,
        ))
    }
}

#[derive(Queryable, Debug)]
struct MatchModel {
    id: i64,
    match_number: i32,
    team_number: i32,
    auto_score_coral: bool,
    auto_score_algae: bool,
    must_start_specific_position: bool,
    teleop_dealgifying: bool,
    starting_position: Option<String>,
    intake_preference: Option<String>,
    scoring_preference: Option<String>,
    drivetrain: Option<String>,
    coral_levels: String,
    notes: String,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

impl MatchModel {
    fn into_stored(self, encoding: ListEncoding) -> QueryResult<Stored<Match>> {
        Ok(Stored {
            id: self.id,
            record: Match {
                match_number: self.match_number,
                team_number: self.team_number,
                auto_score_coral: self.auto_score_coral,
                auto_score_algae: self.auto_score_algae,
                must_start_specific_position: self.must_start_specific_position,
                teleop_dealgifying: self.teleop_dealgifying,
                starting_position: self.starting_position,
                intake_preference: self.intake_preference,
                scoring_preference: self.scoring_preference,
                drivetrain: self.drivetrain,
                coral_levels: decode_list(encoding, &self.coral_levels)?,
                notes: self.notes,
            },
            created_at: Some(self.created_at),
            updated_at: Some(self.updated_at),
        })
    }
}

impl PersistenceStrategy<Match> for Orm {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Orm
    }

    fn find_by_key(
        &self,
        conn: &mut SqliteConnection,
        schema: &SchemaInfo,
        key: MatchKey,
    ) -> QueryResult<Option<Stored<Match>>> {
        matches::table
            .filter(
                matches::match_number
                    .eq(key.match_number)
                    .and(matches::team_number.eq(key.team_number)),
            )
            .first::<MatchModel>(conn)
            .optional()?
            .map(|model| model.into_stored(schema.list_column_type.encoding()))
            .transpose()
    }

    fn insert(
        &self,
        conn: &mut SqliteConnection,
        schema: &SchemaInfo,
        record: &Match,
    ) -> QueryResult<Stored<Match>> {
        let coral_levels =
            encode_list(schema.list_column_type.encoding(), &record.coral_levels)?;
        diesel::insert_into(matches::table)
            .values((
                matches::match_number.eq(record.match_number),
                matches::team_number.eq(record.team_number),
                matches::auto_score_coral.eq(record.auto_score_coral),
                matches::auto_score_algae.eq(record.auto_score_algae),
                matches::must_start_specific_position
                    .eq(record.must_start_specific_position),
                matches::teleop_dealgifying.eq(record.teleop_dealgifying),
                matches::starting_position.eq(record.starting_position.clone()),
                matches::intake_preference.eq(record.intake_preference.clone()),
                matches::scoring_preference
                    .eq(record.scoring_preference.clone()),
                matches::drivetrain.eq(record.drivetrain.clone()),
                matches::coral_levels.eq(coral_levels),
                matches::notes.eq(&record.notes),
                matches::created_at.eq(now),
                matches::updated_at.eq(now),
            ))
            .execute(conn)?;

        read_back(PersistenceStrategy::<Match>::find_by_key(
            self,
            conn,
            schema,
            record.key(),
        ))
    }

    fn update(
        &self,
        conn: &mut SqliteConnection,
        schema: &SchemaInfo,
        record: &Match,
    ) -> QueryResult<Stored<Match>> {
        let coral_levels =
            encode_list(schema.list_column_type.encoding(), &record.coral_levels)?;
        let changed = diesel::update(
            matches::table.filter(
                matches::match_number
                    .eq(record.match_number)
                    .and(matches::team_number.eq(record.team_number)),
            ),
        )
        .set((
            matches::auto_score_coral.eq(record.auto_score_coral),
            matches::auto_score_algae.eq(record.auto_score_algae),
            matches::must_start_specific_position
                .eq(record.must_start_specific_position),
            matches::teleop_dealgifying.eq(record.teleop_dealgifying),
            matches::starting_position.eq(record.starting_position.clone()),
            matches::intake_preference.eq(record.intake_preference.clone()),
            matches::scoring_preference.eq(record.scoring_preference.clone()),
            matches::drivetrain.eq(record.drivetrain.clone()),
            matches::coral_levels.eq(coral_levels),
            matches::notes.eq(&record.notes),
            matches::updated_at.eq(now),
        ))
        .execute(conn)?;
        if changed == 0 {
            return Err(diesel::result::Error::NotFound);
        }

        read_back(PersistenceStrategy::<Match>::find_by_key(
            self,
            conn,
            schema,
            record.key(),
        ))
    }
}
