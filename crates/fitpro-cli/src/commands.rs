//! Command handlers. Each prints its result to stdout.

use std::io::{self, Write};

use anyhow::{anyhow, bail, Context, Result};
use tracing::{debug, warn};

use fitpro_core::models::{parse_repetitions, sort_by_order, Course, Workout};
use fitpro_core::session::AddCourseOutcome;
use fitpro_core::{video, Config, SessionController};

use crate::cli::Command;

/// Environment variable consulted for the login email
const EMAIL_ENV: &str = "FITPRO_EMAIL";

/// Environment variable consulted before prompting for a password
const PASSWORD_ENV: &str = "FITPRO_PASSWORD";

pub async fn run(command: Command, session: &SessionController, config: &mut Config) -> Result<()> {
    match command {
        Command::Login { email } => {
            let (email, password) = credentials(email, config)?;
            session
                .login(&email, &password)
                .await
                .map_err(|e| anyhow!(e.user_message()))?;
            remember_email(config, email);
            print_user(session);
        }
        Command::Register { email } => {
            let (email, password) = credentials(email, config)?;
            session
                .register(&email, &password)
                .await
                .map_err(|e| anyhow!(e.user_message()))?;
            remember_email(config, email);
            println!("Account created.");
            print_user(session);
        }
        Command::Logout => {
            session.logout();
            println!("Logged out.");
        }
        Command::Me => print_user(session),
        Command::Courses => {
            // Signed-in users get their profile courses marked
            if let Err(e) = session.restore().await {
                debug!(error = %e, "Listing courses without a session");
            }
            let mut courses = session.courses().get_courses().await?;
            sort_by_order(&mut courses);
            for course in &courses {
                let marker = if session.is_course_selected(&course.id) { "*" } else { " " };
                println!("{} {:<10} {}", marker, course.id, course.display_name());
            }
        }
        Command::Course { id } => {
            let course = session.courses().get_course_by_id(&id).await?;
            print_course(&course);
        }
        Command::Workouts { course_id } => {
            let workouts = session.courses().get_course_workouts(&course_id).await?;
            for workout in &workouts {
                println!("{:<10} {}", workout.id, workout.name);
            }
        }
        Command::Add { course_id } => match session.add_course(&course_id).await? {
            AddCourseOutcome::Added => println!("Added {}.", course_id),
            AddCourseOutcome::Queued => {
                println!("The server queued {}; it will appear on your profile shortly.", course_id)
            }
        },
        Command::Remove { course_id } => {
            session.remove_course(&course_id).await?;
            println!("Removed {}.", course_id);
        }
        Command::Progress {
            course_id,
            workout_id: Some(workout_id),
        } => {
            let workout = session.courses().get_workout_by_id(&workout_id).await?;
            let progress = session
                .courses()
                .get_workout_progress(&course_id, &workout)
                .await?;
            print_workout_progress(&workout, &progress.progress_data, progress.workout_completed);
            println!("{:.0}% done", progress.completion_ratio(&workout) * 100.0);
        }
        Command::Progress {
            course_id,
            workout_id: None,
        } => {
            let progress = session.courses().get_course_progress(&course_id).await?;
            println!("{}", serde_json::to_string_pretty(&progress)?);
        }
        Command::Save {
            course_id,
            workout_id,
            reps,
        } => {
            let workout = session.courses().get_workout_by_id(&workout_id).await?;
            let values: Vec<i64> = reps.iter().map(|r| parse_repetitions(r)).collect();
            let (saved, message) = session
                .courses()
                .save_workout_progress(&course_id, &workout, &values)
                .await?;
            let saved: Vec<i64> = saved.into_iter().map(i64::from).collect();
            print_workout_progress(&workout, &saved, false);
            if !message.is_empty() {
                println!("{}", message);
            }
        }
        Command::Reset {
            course_id,
            workout_id,
        } => {
            let message = match workout_id {
                Some(workout_id) => {
                    session
                        .courses()
                        .reset_workout_progress(&course_id, &workout_id)
                        .await?
                }
                None => session.courses().reset_course_progress(&course_id).await?,
            };
            println!("{}", if message.is_empty() { "Progress reset." } else { message.as_str() });
        }
        Command::Pending { clear } => {
            if clear {
                session.pending().clear();
                println!("Pending queue cleared.");
            } else {
                for id in session.pending().ids() {
                    println!("{}", id);
                }
            }
        }
        Command::Embed { url } => {
            let embed = video::embed_url(&url)
                .ok_or_else(|| anyhow!("Not a recognised YouTube link: {}", url))?;
            println!("{}", embed);
        }
        Command::Help => {}
    }
    Ok(())
}

/// Email from the argument, the environment or the last login, in that
/// order; password from the environment or a prompt
fn credentials(email: Option<String>, config: &Config) -> Result<(String, String)> {
    let email = match email
        .or_else(|| std::env::var(EMAIL_ENV).ok())
        .or_else(|| config.last_email.clone())
    {
        Some(email) => email,
        None => prompt_email()?,
    };

    let password = match std::env::var(PASSWORD_ENV) {
        Ok(password) if !password.is_empty() => password,
        _ => rpassword::prompt_password("Password: ").context("Failed to read password")?,
    };
    Ok((email, password))
}

fn prompt_email() -> Result<String> {
    print!("Email: ");
    io::stdout().flush()?;

    let mut email = String::new();
    io::stdin().read_line(&mut email)?;
    let email = email.trim().to_string();
    if email.is_empty() {
        bail!("Email is required");
    }
    Ok(email)
}

fn remember_email(config: &mut Config, email: String) {
    config.last_email = Some(email);
    if let Err(e) = config.save() {
        warn!(error = %e, "Failed to save config");
    }
}

fn print_user(session: &SessionController) {
    let state = session.state();
    let Some(user) = state.user else {
        println!("Not logged in.");
        return;
    };
    println!("Logged in as {}", user.email);

    let pending = session.pending().ids();
    if user.selected_courses.is_empty() && pending.is_empty() {
        println!("No courses on your profile.");
        return;
    }
    for id in &user.selected_courses {
        println!("  {}", id);
    }
    for id in pending.difference(&user.selected_courses) {
        println!("  {} (pending)", id);
    }
}

fn print_course(course: &Course) {
    println!("{} ({})", course.display_name(), course.id);
    if !course.name_en.is_empty() && course.name_en != course.display_name() {
        println!("  {}", course.name_en);
    }
    if !course.description.is_empty() {
        println!("\n{}\n", course.description);
    }
    if let Some(difficulty) = &course.difficulty {
        println!("Difficulty: {}", difficulty);
    }
    if let Some(days) = course.duration_in_days {
        println!("Duration:   {} days", days);
    }
    if let Some(daily) = course.duration_display() {
        println!("Daily:      {}", daily);
    }
    for direction in &course.directions {
        println!("  - {}", direction);
    }
    println!("Workouts:   {}", course.workouts.len());
}

fn print_workout_progress(workout: &Workout, values: &[i64], completed: bool) {
    println!("{} ({})", workout.name, workout.id);
    if let Some(url) = workout.embed_url() {
        println!("Video: {}", url);
    }
    if !workout.has_exercises() {
        println!("{}", if completed { "Completed" } else { "Not completed" });
        return;
    }
    for (exercise, done) in workout.exercises.iter().zip(values) {
        println!("  {:>3}/{:<3} {}", done, exercise.quantity, exercise.name);
    }
}
