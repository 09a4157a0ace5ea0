//! Algorithm selectors.
//!
//! Every variant keeps a stable numeric id so that files written with one
//! ordering of the variants stay readable after a reordering.

use derive_more::Display;
use serde::{Deserialize, Serialize};

use crate::errors::DriftError;

macro_rules! selector {
    ($name:ident { $($variant:ident = $id:literal),+ $(,)? }) => {
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const fn id(self) -> u8 {
                match self {
                    $($name::$variant => $id),+
                }
            }
        }

        impl TryFrom<u8> for $name {
            type Error = DriftError;

            fn try_from(id: u8) -> Result<Self, Self::Error> {
                match id {
                    $($id => Ok($name::$variant),)+
                    _ => Err(DriftError::ReadError(format!(
                        "Invalid {} id: {id}",
                        stringify!($name)
                    ))),
                }
            }
        }
    };
}

selector!(InfectionAlgorithm {
    Approximate1 = 1,
    Approximate2 = 2,
    Approximate3 = 3,
    Exact = 4,
});

selector!(MutationAlgorithm {
    Approximate = 5,
    Exact = 6,
    None = 7,
});

selector!(PatchStatsAlgorithm {
    Incidence = 8,
    All = 9,
});

selector!(Connectivity {
    Flat = 10,
    Cylindrical = 11,
    Tropics = 12,
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stable_ids() {
        assert_eq!(InfectionAlgorithm::Exact.id(), 4);
        assert_eq!(MutationAlgorithm::None.id(), 7);
        assert_eq!(PatchStatsAlgorithm::All.id(), 9);
        assert_eq!(Connectivity::Tropics.id(), 12);
        for id in 1..=4 {
            assert_eq!(InfectionAlgorithm::try_from(id).unwrap().id(), id);
        }
        assert!(MutationAlgorithm::try_from(4).is_err());
        assert!(Connectivity::try_from(0).is_err());
        assert_eq!(Connectivity::try_from(11).unwrap(), Connectivity::Cylindrical);
        assert_eq!(Connectivity::Cylindrical.to_string(), "Cylindrical");
    }
}
