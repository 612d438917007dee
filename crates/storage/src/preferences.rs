use async_trait::async_trait;
use liftlog_domain::{
    Preferences, PreferencesRepository, ReadError, Theme, Time, UpdateError, UserID, WeightUnit,
};
use rusqlite::{Connection, OptionalExtension, params};

use crate::{
    Storage,
    db::{DbError, conversion_error},
};

fn read_preferences(conn: &Connection, user_id: UserID) -> Result<Preferences, DbError> {
    let preferences = conn
        .query_row(
            "SELECT weight_unit, theme, default_rest, show_rpe, beep_volume
             FROM preferences WHERE user_id = ?1",
            [user_id.to_string()],
            |row| {
                let weight_unit: String = row.get(0)?;
                let theme: String = row.get(1)?;
                Ok(Preferences {
                    weight_unit: weight_unit
                        .parse::<WeightUnit>()
                        .map_err(|err| conversion_error(0, err))?,
                    theme: theme
                        .parse::<Theme>()
                        .map_err(|err| conversion_error(1, err))?,
                    default_rest: Time::new(row.get(2)?).map_err(|err| conversion_error(2, err))?,
                    show_rpe: row.get(3)?,
                    beep_volume: row.get(4)?,
                })
            },
        )
        .optional()?;
    Ok(preferences.unwrap_or_default())
}

#[async_trait]
impl PreferencesRepository for Storage {
    async fn read_preferences(&self, user_id: UserID) -> Result<Preferences, ReadError> {
        Ok(self
            .db
            .call(move |conn| read_preferences(conn, user_id))
            .await?)
    }

    async fn write_preferences(
        &self,
        user_id: UserID,
        preferences: Preferences,
    ) -> Result<Preferences, UpdateError> {
        Ok(self
            .db
            .call(move |conn| {
                let tx = conn.unchecked_transaction()?;
                crate::users::read_user(&tx, user_id)?;
                tx.execute(
                    "INSERT INTO preferences
                        (user_id, weight_unit, theme, default_rest, show_rpe, beep_volume)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                     ON CONFLICT (user_id) DO UPDATE SET
                        weight_unit = excluded.weight_unit,
                        theme = excluded.theme,
                        default_rest = excluded.default_rest,
                        show_rpe = excluded.show_rpe,
                        beep_volume = excluded.beep_volume",
                    params![
                        user_id.to_string(),
                        preferences.weight_unit.as_ref(),
                        preferences.theme.as_ref(),
                        u32::from(preferences.default_rest),
                        preferences.show_rpe,
                        preferences.beep_volume,
                    ],
                )?;
                let preferences = read_preferences(&tx, user_id)?;
                tx.commit()?;
                Ok(preferences)
            })
            .await?)
    }
}
