mod cache;
mod relocate;
mod run;
mod scan;
#[cfg(test)]
mod tests;
mod watcher;

pub use run::run;
pub use scan::list_matching_files;
