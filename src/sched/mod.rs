//! Cooperative scheduling: fork tree, semaphore hand-off, and the scheduler
//! itself (spec.md §4.G, §4.H).

mod order_tree;
mod semaphore;
mod scheduler;

pub use scheduler::Scheduler;
