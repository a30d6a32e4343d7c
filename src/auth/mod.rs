/*!
 * # Session and role handling
 *
 * The client never looks a token up from ambient storage. Whoever builds an
 * [`crate::client::AllocationStatusClient`] hands it a [`SessionProvider`],
 * which supplies the bearer token and is notified when the server rejects it.
 *
 * Roles are read from the token's claims and only drive which actions the
 * client offers; the server re-checks every call.
 */

mod claims;
mod session;

pub use claims::{decode_claims, Claims, Role};
pub use session::{session_file_path, FileSession, SessionProvider, StaticSession, StoredSession};
