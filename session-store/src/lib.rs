// session-store/src/lib.rs
//! Client-side session store for NexusAI.
//!
//! Keeps a local view of who is signed in and what their profile is,
//! consistent with an external authority that pushes session changes.

pub mod actors;
pub mod authority;
pub mod console;
pub mod error;
pub mod forms;
pub mod handle;
pub mod snapshot;
pub mod state;

pub use actors::session_store::Registration;
pub use authority::{
    AuthAuthority, CampaignRows, ChangeNotice, Collaborators, HttpAuthority, MemoryAuthority,
    ProfileRows, SessionChanges, SignUp,
};
pub use error::SessionError;
pub use handle::SessionHandle;
pub use snapshot::SessionSnapshot;
pub use state::{Phase, ProfileStatus};
