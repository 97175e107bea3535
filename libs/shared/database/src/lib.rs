pub mod supabase;

pub use supabase::{SupabaseClient, SupabaseResponse};
