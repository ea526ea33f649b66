mod oneshot;
mod task_pool;

pub use oneshot::TaskHandle;
pub use task_pool::TaskPool;

pub(crate) use task_pool::panic_message;
