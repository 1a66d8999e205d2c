//! Serde support for [`Sketch`], enabled by the `with_serde` feature.
//!
//! A sketch serializes as its stable byte layout (see [`crate::Sketch::to_bytes`]), so any
//! serde format round-trips exactly the same state as the binary codec, and bytes written
//! by one can be handed to the other.

use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};

use crate::sketch::Sketch;

impl Serialize for Sketch {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_bytes(&self.to_bytes())
    }
}

impl<'de> Deserialize<'de> for Sketch {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bytes: Vec<u8> = Deserialize::deserialize(deserializer)?;
        Sketch::from_bytes(&bytes).map_err(D::Error::custom)
    }
}
