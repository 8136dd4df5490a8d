pub mod change;
pub mod error;
pub mod ids;
pub mod spec;

pub use change::{
    Change, ChangeAction, ChangeRecord, ChangeSink, MemorySink, RESET_SENTINEL,
};
pub use error::{ModelError, Result};
pub use ids::{FRESH_NS, FRESH_PREFIX, document_id_from_filename};
pub use spec::{FieldRef, Matching, Mode, Operation, OperationKind, OperationSpec};
