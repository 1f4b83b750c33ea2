pub mod checklist;
pub mod item;
pub mod template;
pub mod template_checklist;
pub mod template_item;
