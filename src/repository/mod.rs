pub mod lesson_repository;
pub mod module_repository;

pub use lesson_repository::LessonRepository;
pub use module_repository::ModuleRepository;
