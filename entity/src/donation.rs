use sea_orm::entity::prelude::*;
use std::str::FromStr;

/// Donation lifecycle status.
///
/// `Pending` is the only non-terminal state.
#[derive(EnumIter, DeriveActiveEnum, Debug, Clone, Copy, PartialEq, Eq)]
#[sea_orm(rs_type = "i32", db_type = "Integer")]
pub enum Status {
    Pending = 0,
    Success = 1,
    Failed = 2,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Pending => "PENDING",
            Status::Success => "SUCCESS",
            Status::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Status::Pending)
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Ok(Status::Pending),
            "SUCCESS" => Ok(Status::Success),
            "FAILED" => Ok(Status::Failed),
            _ => Err(format!("unknown donation status: {}", s)),
        }
    }
}

/// donations

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "donations")]
pub struct Model {
    /// insertion order, breaks ties between equal `created_at`
    #[sea_orm(primary_key)]
    pub seq: i32,

    /// public opaque id
    #[sea_orm(unique)]
    pub id: String,

    pub user_id: i32,

    pub campaign: String,

    /// whole units of the display currency
    pub amount: i64,

    pub status: Status,

    /// processor transaction id, set once paid
    pub payment_id: Option<String>,

    /// hosted checkout session id
    pub session_id: Option<String>,

    /// data create time
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status() {
        assert_eq!("success".parse::<Status>(), Ok(Status::Success));
        assert_eq!("FAILED".parse::<Status>(), Ok(Status::Failed));
        assert!("paid".parse::<Status>().is_err());
        assert!(!Status::Pending.is_terminal());
        assert!(Status::Success.is_terminal());
        assert_eq!(Status::Failed.as_str(), "FAILED");
    }
}
