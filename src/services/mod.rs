pub mod chunk_index;
pub mod paint_session;
pub mod painter;
pub mod ports;
pub mod reconciler;
pub mod scheduler;
pub mod tile_diff;
pub mod tile_source;
pub mod write_channel;
pub mod write_queue;

pub use chunk_index::{build_chunks, ChunkIndex, TileChunk};
pub use paint_session::EnginePaintSession;
pub use painter::{AutoPainter, ExecutionState, RunOutcome};
pub use ports::{
    AccountSnapshot, AccountSource, AtomicFlag, BroadcastStatus, CycleCompletion, CycleReport,
    EnvironmentReset, ExitOnRestart, LogStatus, PaintSession, SharedFlag, StaticAccount,
    StatusSink, TileData, TileSource, WriteChannel,
};
pub use reconciler::{reconcile, ReconcileSummary};
pub use scheduler::{schedule, TileBatch, WritePlan};
pub use tile_diff::{TileAnalysis, TileAnalyzer, TileReport};
pub use tile_source::{DirTileSource, HttpTileSource};
pub use write_channel::HttpWriteChannel;
pub use write_queue::WriteQueue;
