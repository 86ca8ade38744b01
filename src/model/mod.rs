// ============================================================================
// Entity Model
// ============================================================================
//
// Records held by the synchronization layer. Field names follow the wire
// format (camelCase JSON), snake_case spellings are accepted on input.
//
// ============================================================================

pub mod connection;
pub mod profile;

pub use connection::{Connection, ConnectionPatch, NewConnectionRequest, ProfileSummary};
pub use profile::{AuthIdentity, Profile, ProfileField, ProfileRole, ProfileUpdate};
