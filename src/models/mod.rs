mod task;
mod user;

pub use task::{
    parse_due_date, CreateTaskInput, Task, TaskFilter, TaskPriority, TaskStatistics, TaskStatus,
    UpdateTaskInput,
};
pub use user::{AuthResponse, LoginInput, PublicUser, RegisterInput, User};
