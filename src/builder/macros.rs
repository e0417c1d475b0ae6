//! Macros for ergonomic machine construction.

/// Declare an event enum together with its payload-free kind enum and the
/// [`Event`](crate::core::Event) implementation tying them together.
///
/// Variants may be unit, tuple or struct variants.
///
/// # Example
///
/// ```
/// use choreo::core::Event;
/// use choreo::event_enum;
///
/// event_enum! {
///     pub enum QueryEvent {
///         Run,
///         Loaded(Vec<String>),
///         Failed { reason: String },
///     }
///     kind: QueryEventKind
/// }
///
/// assert_eq!(QueryEvent::Loaded(vec![]).kind(), QueryEventKind::Loaded);
/// assert_eq!(QueryEvent::Run.name(), "Run");
/// ```
#[macro_export]
macro_rules! event_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident
                $( ( $($field:ty),* $(,)? ) )?
                $( { $($fname:ident : $fty:ty),* $(,)? } )?
            ),* $(,)?
        }
        kind: $kind:ident
    ) => {
        $(#[$meta])*
        #[derive(Clone, Debug)]
        $vis enum $name {
            $(
                $(#[$variant_meta])*
                $variant
                $( ( $($field),* ) )?
                $( { $($fname : $fty),* } )?
            ),*
        }

        #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
        $vis enum $kind {
            $($variant),*
        }

        impl $crate::core::Event for $name {
            type Kind = $kind;

            fn kind(&self) -> $kind {
                match self {
                    $(Self::$variant { .. } => $kind::$variant),*
                }
            }

            fn name(&self) -> &'static str {
                match self {
                    $(Self::$variant { .. } => stringify!($variant)),*
                }
            }
        }
    };
}
