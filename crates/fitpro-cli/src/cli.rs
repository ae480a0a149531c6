//! Command-line argument parsing.

use anyhow::{anyhow, bail, Result};

pub const USAGE: &str = "\
Usage: fitpro <command> [args]

Commands:
  login [email]                         Sign in (password from FITPRO_PASSWORD or prompt)
  register [email]                      Create an account and sign in
  logout                                Forget the stored token
  me                                    Show the signed-in user
  courses                               List the course catalogue
  course <id>                           Show one course
  workouts <course-id>                  List a course's workouts
  add <course-id>                       Add a course to your profile
  remove <course-id>                    Remove a course from your profile
  progress <course-id> [workout-id]     Show recorded progress
  save <course-id> <workout-id> <reps>  Record repetitions, one value per exercise
  reset <course-id> [workout-id]        Reset course or workout progress
  pending [clear]                       Show or clear queued course adds
  embed <url>                           Print the embeddable form of a video link

Set RUST_LOG=debug for diagnostics and FITPRO_API_URL to change the backend.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Login { email: Option<String> },
    Register { email: Option<String> },
    Logout,
    Me,
    Courses,
    Course { id: String },
    Workouts { course_id: String },
    Add { course_id: String },
    Remove { course_id: String },
    Progress { course_id: String, workout_id: Option<String> },
    Save { course_id: String, workout_id: String, reps: Vec<String> },
    Reset { course_id: String, workout_id: Option<String> },
    Pending { clear: bool },
    Embed { url: String },
    Help,
}

impl Command {
    /// Whether the command needs a restored session before it runs
    pub fn needs_session(&self) -> bool {
        matches!(
            self,
            Command::Me
                | Command::Add { .. }
                | Command::Remove { .. }
                | Command::Workouts { .. }
                | Command::Progress { .. }
                | Command::Save { .. }
                | Command::Reset { .. }
        )
    }

    /// Parse arguments, excluding the program name
    pub fn parse(args: &[String]) -> Result<Self> {
        let mut args = args.iter().map(String::as_str);
        let Some(name) = args.next() else {
            return Ok(Command::Help);
        };
        let rest: Vec<&str> = args.collect();

        let required = |index: usize, what: &str| -> Result<String> {
            rest.get(index)
                .map(|s| s.to_string())
                .ok_or_else(|| anyhow!("`{}` needs {}", name, what))
        };
        let optional = |index: usize| rest.get(index).map(|s| s.to_string());

        let command = match name {
            "login" => Command::Login { email: optional(0) },
            "register" => Command::Register { email: optional(0) },
            "logout" => Command::Logout,
            "me" => Command::Me,
            "courses" => Command::Courses,
            "course" => Command::Course {
                id: required(0, "a course id")?,
            },
            "workouts" => Command::Workouts {
                course_id: required(0, "a course id")?,
            },
            "add" => Command::Add {
                course_id: required(0, "a course id")?,
            },
            "remove" => Command::Remove {
                course_id: required(0, "a course id")?,
            },
            "progress" => Command::Progress {
                course_id: required(0, "a course id")?,
                workout_id: optional(1),
            },
            "save" => Command::Save {
                course_id: required(0, "a course id")?,
                workout_id: required(1, "a workout id")?,
                reps: rest.iter().skip(2).map(|s| s.to_string()).collect(),
            },
            "reset" => Command::Reset {
                course_id: required(0, "a course id")?,
                workout_id: optional(1),
            },
            "pending" => match rest.first() {
                None => Command::Pending { clear: false },
                Some(&"clear") => Command::Pending { clear: true },
                Some(other) => bail!("Unknown pending action: {}", other),
            },
            "embed" => Command::Embed {
                url: required(0, "a video URL")?,
            },
            "help" | "-h" | "--help" => Command::Help,
            other => bail!("Unknown command: {}", other),
        };
        Ok(command)
    }
}
