use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

str_enum!(RecurrenceKind {
    Daily => "daily",
    EveryOtherDay => "every_other_day",
    Weekly => "weekly",
    EveryNDays => "every_n_days",
    SpecificDates => "specific_dates",
});

// Declaration order is severity order: Routine < Important < Critical.
str_enum!(Criticality {
    Routine => "routine",
    Important => "important",
    Critical => "critical",
});

str_enum!(HistoryKind {
    Snooze => "snooze",
    Delay => "delay",
});

str_enum!(AckOutcome {
    Taken => "taken",
    Skipped => "skipped",
    Snoozed => "snoozed",
});
