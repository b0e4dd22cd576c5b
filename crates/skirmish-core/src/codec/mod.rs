//! State serializer used on every request and reply of the agent protocol.

pub mod objects;
pub mod state;

pub use self::objects::{SONOBUOY_TAG, Sonobuoy, TORPEDO_TAG, Torpedo};
pub use self::state::{StateValue, deserialize, from_text, serialize, to_text};
