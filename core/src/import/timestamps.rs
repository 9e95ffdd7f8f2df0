use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Local, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::database::backend::TableSchema;
use crate::database::sql_value::SqlValue;
use crate::import::record::Record;

/// Creation and update columns recognised on the target table. The legacy
/// `_on` pair is stamped alongside the `_at` pair when both exist.
pub const TIMESTAMP_COLUMNS: &[&str] = &["created_at", "created_on", "updated_at", "updated_on"];

/// The zone timestamps are written in. In YAML:
///
/// ```yaml
/// type: fixed
/// offset_seconds: 3600
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TimeZoneSetting {
    #[default]
    Utc,
    Local,
    Fixed { offset_seconds: i32 },
}

impl TimeZoneSetting {
    /// Converts an instant into wall-clock time in this zone.
    pub fn wall_clock(&self, instant: DateTime<Utc>) -> NaiveDateTime {
        match self {
            TimeZoneSetting::Utc => instant.naive_utc(),
            TimeZoneSetting::Local => instant.with_timezone(&Local).naive_local(),
            TimeZoneSetting::Fixed { offset_seconds } => {
                match FixedOffset::east_opt(*offset_seconds) {
                    Some(offset) => instant.with_timezone(&offset).naive_local(),
                    None => {
                        warn!(
                            "Invalid fixed offset {} seconds, falling back to UTC",
                            offset_seconds
                        );
                        instant.naive_utc()
                    }
                }
            }
        }
    }
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Always returns the same instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Stamps every timestamp column the table has with `stamp`. Values the
/// caller already supplied (anything but NULL) are left alone. Columns the
/// input did not mention are appended. Returns the resulting column list.
pub fn assign_timestamps(
    records: &mut [Record],
    columns: Arc<[String]>,
    schema: &TableSchema,
    stamp: NaiveDateTime,
) -> Arc<[String]> {
    let present: Vec<&str> =
        TIMESTAMP_COLUMNS.iter().copied().filter(|column| schema.has_column(column)).collect();

    if present.is_empty() {
        return columns;
    }

    let existing: Vec<usize> = present
        .iter()
        .filter_map(|column| columns.iter().position(|name| name == column))
        .collect();
    let appended: Vec<String> = present
        .iter()
        .filter(|column| !columns.iter().any(|name| name == *column))
        .map(|column| column.to_string())
        .collect();

    debug!("Stamping {:?} on {} records with {}", present, records.len(), stamp);

    let stamped: Arc<[String]> = if appended.is_empty() {
        columns
    } else {
        columns.iter().cloned().chain(appended.iter().cloned()).collect()
    };

    for record in records.iter_mut() {
        for &index in &existing {
            if record.values()[index].is_null() {
                record.set(index, SqlValue::Timestamp(stamp));
            }
        }
        if !appended.is_empty() {
            record.extend_columns(
                Arc::clone(&stamped),
                appended.iter().map(|_| SqlValue::Timestamp(stamp)).collect(),
            );
        }
    }

    stamped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::backend::ColumnInfo;
    use crate::import::record::Origin;
    use chrono::{NaiveDate, TimeZone};

    fn schema(columns: &[&str]) -> TableSchema {
        TableSchema {
            table: "books".to_string(),
            columns: columns
                .iter()
                .map(|name| ColumnInfo {
                    name: name.to_string(),
                    sql_type: "TEXT".to_string(),
                    nullable: true,
                })
                .collect(),
            primary_key: None,
        }
    }

    fn stamp() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap().and_hms_opt(12, 0, 0).unwrap()
    }

    #[test]
    fn test_appends_all_present_pairs() {
        let columns: Arc<[String]> = vec!["title".to_string()].into();
        let mut records = vec![
            Record::new(Origin::Row(0), Arc::clone(&columns), vec!["LDAP".into()]),
            Record::new(Origin::Row(1), Arc::clone(&columns), vec!["Other".into()]),
        ];
        let schema =
            schema(&["id", "title", "created_at", "created_on", "updated_at", "updated_on"]);

        let columns = assign_timestamps(&mut records, columns, &schema, stamp());

        assert_eq!(
            &*columns,
            &["title", "created_at", "created_on", "updated_at", "updated_on"].map(String::from)
        );
        for record in &records {
            assert_eq!(record.columns(), &*columns);
            for column in TIMESTAMP_COLUMNS {
                assert_eq!(record.get(column), Some(&SqlValue::Timestamp(stamp())));
            }
        }
    }

    #[test]
    fn test_caller_supplied_values_are_kept() {
        let supplied = NaiveDate::from_ymd_opt(2001, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        let columns: Arc<[String]> = vec!["title".to_string(), "created_at".to_string()].into();
        let mut records = vec![
            Record::new(Origin::Row(0), Arc::clone(&columns), vec!["a".into(), supplied.into()]),
            Record::new(Origin::Row(1), Arc::clone(&columns), vec!["b".into(), SqlValue::Null]),
        ];

        let schema = schema(&["title", "created_at", "updated_at"]);
        let columns = assign_timestamps(&mut records, columns, &schema, stamp());

        assert_eq!(&*columns, &["title", "created_at", "updated_at"].map(String::from));
        assert_eq!(records[0].get("created_at"), Some(&SqlValue::Timestamp(supplied)));
        assert_eq!(records[1].get("created_at"), Some(&SqlValue::Timestamp(stamp())));
        assert_eq!(records[0].get("updated_at"), Some(&SqlValue::Timestamp(stamp())));
    }

    #[test]
    fn test_no_timestamp_columns_is_noop() {
        let columns: Arc<[String]> = vec!["title".to_string()].into();
        let mut records = vec![Record::new(Origin::Row(0), Arc::clone(&columns), vec!["a".into()])];

        let result =
            assign_timestamps(&mut records, Arc::clone(&columns), &schema(&["title"]), stamp());

        assert!(Arc::ptr_eq(&result, &columns));
        assert_eq!(records[0].values(), &[SqlValue::from("a")]);
    }

    #[test]
    fn test_time_zone_wall_clock() {
        let instant = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();

        assert_eq!(TimeZoneSetting::Utc.wall_clock(instant), stamp());
        assert_eq!(
            TimeZoneSetting::Fixed { offset_seconds: -5 * 3600 }.wall_clock(instant),
            NaiveDate::from_ymd_opt(2024, 5, 1).unwrap().and_hms_opt(7, 0, 0).unwrap()
        );
        assert_eq!(
            TimeZoneSetting::Local.wall_clock(instant),
            instant.with_timezone(&Local).naive_local()
        );
    }

    #[test]
    fn test_time_zone_from_yaml() {
        let zone: TimeZoneSetting = serde_yaml::from_str("type: utc").unwrap();
        assert_eq!(zone, TimeZoneSetting::Utc);

        let zone: TimeZoneSetting = serde_yaml::from_str("type: local").unwrap();
        assert_eq!(zone, TimeZoneSetting::Local);

        let yaml = r#"
          type: fixed
          offset_seconds: 3600
        "#;
        let zone: TimeZoneSetting = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(zone, TimeZoneSetting::Fixed { offset_seconds: 3600 });
    }

    #[test]
    fn test_time_zone_round_trips_through_yaml() {
        let zone = TimeZoneSetting::Fixed { offset_seconds: -7200 };
        let yaml = serde_yaml::to_string(&zone).unwrap();

        assert!(yaml.contains("type: fixed"));
        assert_eq!(serde_yaml::from_str::<TimeZoneSetting>(&yaml).unwrap(), zone);
    }
}
