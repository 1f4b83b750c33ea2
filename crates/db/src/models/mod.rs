pub mod bulk;
pub mod checklist;
pub mod completion;
pub mod due;
pub mod instantiation;
pub mod item;
pub mod summary;
pub mod template;
