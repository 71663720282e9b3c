pub mod cancellation_vote;
pub mod class_schedule;
pub mod confirmation_vote;
pub mod course;
pub mod faculty;
pub mod floor;
pub mod import_job;
pub mod room;
pub mod teacher;

pub use cancellation_vote::Entity as CancellationVote;
pub use class_schedule::Entity as ClassSchedule;
pub use confirmation_vote::Entity as ConfirmationVote;
pub use course::Entity as Course;
pub use faculty::Entity as Faculty;
pub use floor::Entity as Floor;
pub use import_job::Entity as ImportJob;
pub use room::Entity as Room;
pub use teacher::Entity as Teacher;
