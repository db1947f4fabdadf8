pub mod postgrest;
pub mod storage;
pub mod supabase;
pub mod tts;

pub use postgrest::PostgrestAdapter;
pub use storage::StorageAdapter;
pub use supabase::SupabaseClient;
pub use tts::OpenAiTtsAdapter;
