// common/src/models/mod.rs
pub mod campaign;
pub mod profile;
pub mod session;

pub use campaign::{NewCampaign, SavedCampaign};
pub use profile::{NewProfile, Profile, ProfileUpdate};
pub use session::{Identity, Session};
