/// Status enums are stored as lowercase text columns; this keeps the
/// `Display` / `FromStr` pair and the column value in one place.
macro_rules! text_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl core::str::FromStr for $name {
            type Err = $crate::OfficeError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err($crate::OfficeError::InvalidInput(format!(
                        "unknown {} value: {}",
                        stringify!($name),
                        other
                    ))),
                }
            }
        }
    };
}

mod actor;
mod booking;
mod device;
mod leave;
mod message;
mod query;
mod timespan;

pub use actor::*;
pub use booking::*;
pub use device::*;
pub use leave::*;
pub use message::*;
pub use query::*;
pub use timespan::*;

