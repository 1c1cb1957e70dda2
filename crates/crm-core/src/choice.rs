//! Closed label sets (stages, priorities, statuses, currencies).
//!
//! Each set is a plain enum whose wire form is its human label. Input
//! arrives as free text and is checked through [`Choice::parse_label`] so
//! a bad label becomes a field error instead of a body rejection.

/// A closed set of labelled values.
pub trait Choice: Sized + Copy + Default + 'static {
    /// Every value, in declaration order.
    const ALL: &'static [Self];

    /// Wire label of this value.
    fn label(&self) -> &'static str;

    /// Parse a wire label (surrounding whitespace ignored).
    fn parse_label(input: &str) -> Option<Self> {
        let wanted = input.trim();
        Self::ALL.iter().copied().find(|v| v.label() == wanted)
    }

    /// Accepted labels, comma separated, for error messages.
    fn allowed() -> String {
        Self::ALL
            .iter()
            .map(Choice::label)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Declare a [`Choice`] enum with serde labels and a default variant.
macro_rules! choice_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident (default $default:ident) {
            $( $(#[$vmeta:meta])* $variant:ident => $label:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash,
            serde::Serialize, serde::Deserialize, utoipa::ToSchema,
        )]
        pub enum $name {
            $( $(#[$vmeta])* #[serde(rename = $label)] $variant, )+
        }

        impl $crate::choice::Choice for $name {
            const ALL: &'static [Self] = &[$(Self::$variant),+];

            fn label(&self) -> &'static str {
                match self {
                    $( Self::$variant => $label, )+
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::$default
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str($crate::choice::Choice::label(self))
            }
        }
    };
}

pub(crate) use choice_enum;

choice_enum! {
    /// Tri-state progress flag used by chargeables.
    pub enum YesNoPending (default No) {
        /// Done.
        Yes => "yes",
        /// Not done.
        No => "no",
        /// In progress.
        Pending => "pending",
    }
}

choice_enum! {
    /// Priority shared by leads and tasks.
    pub enum Priority (default Medium) {
        /// Urgent.
        High => "High",
        /// Normal.
        Medium => "Medium",
        /// Can wait.
        Low => "Low",
    }
}
