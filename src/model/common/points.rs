use crate::error::Error;

/// Point values awarded or charged by the voting engine.
pub struct Points;

impl Points {
    /// Credited for the first vote a user casts in a poll.
    pub const VOTE: i64 = 1;
}

/// Direction of a moderator points adjustment.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PointsAction {
    Deduct,
    Award,
}

impl PointsAction {
    /// The signed change for applying this action `count` times.
    pub fn delta(self, count: u32) -> i64 {
        let count = i64::from(count);
        match self {
            Self::Deduct => -count,
            Self::Award => count,
        }
    }
}

impl TryFrom<i64> for PointsAction {
    type Error = Error;

    fn try_from(action: i64) -> Result<Self, Self::Error> {
        match action {
            -1 => Ok(Self::Deduct),
            1 => Ok(Self::Award),
            _ => Err(Error::UnknownAction),
        }
    }
}
