pub mod books;

use libreria_kernel::ModuleRegistry;

/// Register all service modules with the registry
pub fn register_all(registry: &mut ModuleRegistry, books: books::BooksState) {
    registry.register(books::create_module(books));
}
