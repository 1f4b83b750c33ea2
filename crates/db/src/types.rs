use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use ts_rs::TS;

/// Calendar unit of a template due offset.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    TS,
    EnumString,
    Display,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DueUnit {
    #[sea_orm(string_value = "minute")]
    Minute,
    #[sea_orm(string_value = "hour")]
    Hour,
    #[sea_orm(string_value = "day")]
    Day,
    #[sea_orm(string_value = "week")]
    Week,
    #[sea_orm(string_value = "month")]
    Month,
}

impl DueUnit {
    pub const ALL: [DueUnit; 5] = [
        DueUnit::Minute,
        DueUnit::Hour,
        DueUnit::Day,
        DueUnit::Week,
        DueUnit::Month,
    ];
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::DueUnit;

    #[test]
    fn due_unit_parses_lowercase_names() {
        assert_eq!(DueUnit::from_str("week").unwrap(), DueUnit::Week);
        assert_eq!(DueUnit::Month.to_string(), "month");
        assert!(DueUnit::from_str("fortnight").is_err());
    }

    #[test]
    fn due_unit_serializes_lowercase() {
        let json = serde_json::to_string(&DueUnit::Hour).unwrap();
        assert_eq!(json, "\"hour\"");
    }
}
