pub mod artifacts;
pub mod model;
pub mod service;

pub use artifacts::{Flashcard, Mcq, Note, Resource, ResourceKind, Segment, Transcript};
pub use model::{Lecture, LectureStatus, LectureStatusView};
pub use service::{LectureDetail, LectureError, LectureService, UploadError};
