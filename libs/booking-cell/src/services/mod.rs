pub mod booking;
pub mod checker;
pub mod memory;
pub mod supabase;

pub use booking::BookingService;
pub use checker::ConflictChecker;
pub use memory::InMemoryConflictChecker;
pub use supabase::SupabaseConflictChecker;
