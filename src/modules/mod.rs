pub mod auth;
pub mod books;
pub mod reviews;

use shelf_kernel::ModuleRegistry;

/// Register all project-specific modules with the registry
///
/// Order matters: `books` references `users`, and `book-reviews` references
/// both.
pub fn register_all(registry: &mut ModuleRegistry) {
    registry.register(auth::create_module());
    registry.register(books::create_module());
    registry.register(reviews::create_module());
}
