pub mod store;
pub mod supabase;

pub use store::StoreError;
pub use supabase::{SupabaseClient, SupabaseError};
