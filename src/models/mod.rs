pub mod asset;
pub mod document;

pub use asset::StaffAsset;
pub use document::{
    AnswerKeyEntry, ChoiceOption, Document, DocumentMeta, MusicRef, Question, QuestionKind,
    RequirementBox, Section, Variant,
};
