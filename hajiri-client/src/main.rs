//! hajiri - Sajilo Hajiri command-line client
//!
//! Drives the attendance backend from a terminal: log in, open an attendance
//! session, submit captured frames for recognition, mark students manually,
//! and manage the academic records an admin maintains.
//!
//! Configuration is resolved from CLI flags, then `HAJIRI_*` environment
//! variables, then `~/.config/hajiri/config.toml`, then built-in defaults.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use hajiri_client::services::academics::{
    AssignmentFilter, ClassFilter, EnrollmentFilter, SubjectFilter,
};
use hajiri_client::services::accounts::{Photo, UserFilter};
use hajiri_client::services::records::{paginate, search, summarize_by_subject, RecordsFilter};
use hajiri_client::services::{
    AcademicsService, AccountsService, AttendanceController, DashboardService, FileFrameSource,
    RecordsService, RecordsSource, RegistrationForm,
};
use hajiri_client::ApiClient;
use hajiri_common::api::auth::{Claims, Role, TokenSlot};
use hajiri_common::api::types::{
    ApprovalAction, AssignTeacherRequest, AttendanceMode, ClassPayload, ClassSubjectId,
    EnrollRequest, SubjectPayload, UserPayload,
};
use hajiri_common::config::{self, ClientSettings, ConfigOverrides};
use serde::Serialize;
use tracing::info;

/// Command-line arguments for hajiri
#[derive(Parser, Debug)]
#[command(name = "hajiri")]
#[command(about = "Sajilo Hajiri attendance client")]
#[command(version)]
struct Cli {
    /// Configuration file (default: <config dir>/hajiri/config.toml)
    #[arg(long, global = true, env = "HAJIRI_CONFIG")]
    config: Option<PathBuf>,

    /// Backend base URL
    #[arg(long, global = true, env = "HAJIRI_BASE_URL")]
    base_url: Option<String>,

    /// Bearer access token
    #[arg(long, global = true, env = "HAJIRI_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Exchange credentials for an access token
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        /// Store the access token in the configuration file
        #[arg(long)]
        save: bool,
    },
    /// Find or create the open session for a class-subject
    Session(SessionArgs),
    /// Capture frames and submit them for face recognition
    Recognize {
        #[command(flatten)]
        session: SessionArgs,
        #[arg(long, default_value = "entry")]
        mode: AttendanceMode,
        /// Image files used as camera frames
        #[arg(long, num_args = 1.., conflicts_with = "dir")]
        frames: Vec<PathBuf>,
        /// Directory whose JPEG/PNG files are used as camera frames
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// Mark one student by roll number
    Mark {
        #[command(flatten)]
        session: SessionArgs,
        #[arg(long)]
        roll: String,
        #[arg(long, default_value = "entry")]
        mode: AttendanceMode,
    },
    #[command(subcommand)]
    Classes(ClassCommand),
    #[command(subcommand)]
    Subjects(SubjectCommand),
    #[command(subcommand)]
    Users(UserCommand),
    /// Review pending registrations
    #[command(subcommand)]
    Approvals(ApprovalCommand),
    /// Teacher assignments to class-subject pairs
    #[command(subcommand)]
    Assign(AssignmentCommand),
    /// Student enrollments in classes
    #[command(subcommand)]
    Enroll(EnrollmentCommand),
    /// Student attendance records with per-subject summaries
    Records {
        #[arg(long)]
        class_id: Option<i64>,
        #[arg(long)]
        subject_id: Option<i64>,
        #[arg(long)]
        date: Option<chrono::NaiveDate>,
        #[arg(long)]
        status: Option<String>,
        /// Local search by name or roll number
        #[arg(long)]
        search: Option<String>,
        /// Page of attendance rows to show per student
        #[arg(long, default_value = "1")]
        page: usize,
    },
    /// Admin overview counts
    Overview,
    /// Register a new account (or update a pending one)
    Register(RegisterArgs),
}

#[derive(Args, Debug)]
struct SessionArgs {
    #[arg(long)]
    class_subject: i64,
    #[arg(long, default_value = "Attendance Session")]
    title: String,
    /// Disallow manual marking in a newly created session
    #[arg(long)]
    no_manual: bool,
}

#[derive(Subcommand, Debug)]
enum ClassCommand {
    List {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        semester: Option<i32>,
        #[arg(long)]
        department: Option<String>,
    },
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        year: i32,
        #[arg(long)]
        semester: i32,
        #[arg(long)]
        department: String,
    },
    Update {
        id: i64,
        #[arg(long)]
        name: String,
        #[arg(long)]
        year: i32,
        #[arg(long)]
        semester: i32,
        #[arg(long)]
        department: String,
    },
    Delete { id: i64 },
}

#[derive(Subcommand, Debug)]
enum SubjectCommand {
    List {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        code: Option<String>,
    },
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        code: String,
    },
    Update {
        id: i64,
        #[arg(long)]
        name: String,
        #[arg(long)]
        code: String,
    },
    Delete { id: i64 },
}

#[derive(Subcommand, Debug)]
enum UserCommand {
    List {
        #[arg(long)]
        role: Option<Role>,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        roll_number: Option<String>,
    },
    Show { id: i64 },
    Create(UserArgs),
    Update {
        id: i64,
        #[command(flatten)]
        user: UserArgs,
    },
    Delete { id: i64 },
}

#[derive(Args, Debug)]
struct UserArgs {
    #[arg(long)]
    name: String,
    #[arg(long)]
    email: String,
    #[arg(long)]
    role: Role,
    /// Required when creating; omit on update to keep the current one
    #[arg(long)]
    password: Option<String>,
}

impl From<UserArgs> for UserPayload {
    fn from(args: UserArgs) -> Self {
        UserPayload {
            name: args.name,
            email: args.email,
            role: args.role,
            password: args.password,
        }
    }
}

#[derive(Subcommand, Debug)]
enum ApprovalCommand {
    /// Accounts waiting for review
    Pending,
    Set {
        #[arg(long)]
        email: String,
        #[arg(long)]
        action: ApprovalAction,
    },
    Feedback {
        #[arg(long)]
        email: String,
        #[arg(long)]
        message: String,
    },
}

#[derive(Subcommand, Debug)]
enum AssignmentCommand {
    List,
    Add {
        #[arg(long)]
        teacher: i64,
        #[arg(long)]
        class: i64,
        #[arg(long)]
        subject: i64,
    },
    Remove { id: i64 },
}

#[derive(Subcommand, Debug)]
enum EnrollmentCommand {
    List,
    Add {
        #[arg(long)]
        student: i64,
        #[arg(long)]
        class: i64,
    },
    Remove { id: i64 },
}

#[derive(Args, Debug)]
struct RegisterArgs {
    #[arg(long)]
    name: String,
    #[arg(long)]
    email: String,
    #[arg(long)]
    password: String,
    #[arg(long)]
    confirm_password: String,
    #[arg(long)]
    role: Role,
    /// Profile photo (JPEG)
    #[arg(long)]
    photo: PathBuf,
    #[arg(long)]
    semester: Option<String>,
    #[arg(long)]
    section: Option<String>,
    #[arg(long)]
    department: Option<String>,
    #[arg(long)]
    roll_number: Option<String>,
    /// Update the pending account with this id instead of creating one
    #[arg(long)]
    update: Option<i64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let overrides = ConfigOverrides {
        config_path: cli.config.clone(),
        base_url: cli.base_url.clone(),
        access_token: cli.token.clone(),
    };
    let settings = ClientSettings::resolve(overrides);

    // RUST_LOG wins over the configured level
    let default_directive = format!(
        "hajiri={level},hajiri_client={level},hajiri_common={level},warn",
        level = settings.log_level
    );
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive)),
        )
        .init();

    info!("hajiri {}", hajiri_client::build_info());
    info!("Backend: {}", settings.base_url);

    let tokens = Arc::new(TokenSlot::new(settings.access_token.clone()));
    let api = Arc::new(ApiClient::new(&settings, tokens.clone())?);
    let claims = settings
        .access_token
        .as_deref()
        .and_then(|token| Claims::from_access_token(token).ok());
    let role = claims.as_ref().map_or(Role::Anonymous, |c| c.role);

    match cli.command {
        Command::Login {
            email,
            password,
            save,
        } => {
            let outcome = AccountsService::new(Arc::clone(&api))
                .login(&email, &password)
                .await?;
            tokens.set(Some(outcome.tokens.access.clone()));

            let destination = DashboardService::new(api)
                .destination(&outcome.claims)
                .await?;
            println!("Logged in as {} ({})", email, outcome.role());
            println!("Destination: {:?} ({})", destination, destination.path());

            if save {
                let path = cli
                    .config
                    .or_else(config::default_config_path)
                    .context("No configuration directory available")?;
                let mut toml = config::load_toml_config(&path).unwrap_or_default();
                toml.access_token = Some(outcome.tokens.access);
                config::write_toml_config(&toml, &path)?;
                println!("Token saved to {}", path.display());
            } else {
                println!("{}", outcome.tokens.access);
            }
        }

        Command::Session(args) => {
            require(role, role.can_run_attendance(), "run attendance sessions")?;
            let controller = controller(&api, &settings, &args).await;
            let outcome = controller.start_session().await;
            print_notice(&controller).await;
            outcome?;
        }

        Command::Recognize {
            session,
            mode,
            frames,
            dir,
        } => {
            require(role, role.can_run_attendance(), "run attendance sessions")?;
            let mut camera = match dir {
                Some(dir) => FileFrameSource::from_dir(&dir)?,
                None if !frames.is_empty() => FileFrameSource::from_paths(frames),
                None => bail!("Provide frames with --frames or --dir"),
            };

            let controller = controller(&api, &settings, &session).await;
            controller.set_mode(mode).await;
            controller.start_session().await?;

            let result = controller.capture_and_recognize(&mut camera).await;
            print_notice(&controller).await;
            for identity in result? {
                println!(
                    "{:>6}  {:<30} {:<6} {}",
                    identity.student_id, identity.name, identity.mode, identity.status
                );
            }
        }

        Command::Mark {
            session,
            roll,
            mode,
        } => {
            require(role, role.can_run_attendance(), "run attendance sessions")?;
            let controller = controller(&api, &settings, &session).await;
            controller.start_session().await?;
            let outcome = controller.mark_manual(&roll, mode).await;
            print_notice(&controller).await;
            if !outcome?.success {
                std::process::exit(1);
            }
        }

        Command::Classes(cmd) => {
            require(role, role.can_manage_academics(), "manage classes")?;
            let academics = AcademicsService::new(api);
            match cmd {
                ClassCommand::List {
                    name,
                    semester,
                    department,
                } => {
                    let filter = ClassFilter {
                        name,
                        semester,
                        department,
                    };
                    print_json(&academics.list_classes(&filter).await?)?;
                }
                ClassCommand::Create {
                    name,
                    year,
                    semester,
                    department,
                } => {
                    let payload = ClassPayload {
                        name,
                        year,
                        semester,
                        department,
                    };
                    print_json(&academics.create_class(&payload).await?)?;
                }
                ClassCommand::Update {
                    id,
                    name,
                    year,
                    semester,
                    department,
                } => {
                    let payload = ClassPayload {
                        name,
                        year,
                        semester,
                        department,
                    };
                    print_json(&academics.update_class(id, &payload).await?)?;
                }
                ClassCommand::Delete { id } => academics.delete_class(id).await?,
            }
        }

        Command::Subjects(cmd) => {
            require(role, role.can_manage_academics(), "manage subjects")?;
            let academics = AcademicsService::new(api);
            match cmd {
                SubjectCommand::List { name, code } => {
                    let filter = SubjectFilter { name, code };
                    print_json(&academics.list_subjects(&filter).await?)?;
                }
                SubjectCommand::Create { name, code } => {
                    let payload = SubjectPayload { name, code };
                    print_json(&academics.create_subject(&payload).await?)?;
                }
                SubjectCommand::Update { id, name, code } => {
                    let payload = SubjectPayload { name, code };
                    print_json(&academics.update_subject(id, &payload).await?)?;
                }
                SubjectCommand::Delete { id } => academics.delete_subject(id).await?,
            }
        }

        Command::Users(cmd) => {
            require(role, role.can_manage_academics(), "manage users")?;
            let accounts = AccountsService::new(api);
            match cmd {
                UserCommand::List {
                    role,
                    name,
                    roll_number,
                } => {
                    let filter = UserFilter {
                        role,
                        name,
                        roll_number,
                        ..Default::default()
                    };
                    print_json(&accounts.list_users(&filter).await?)?;
                }
                UserCommand::Show { id } => print_json(&accounts.get_user(id).await?)?,
                UserCommand::Create(args) => {
                    if args.password.is_none() {
                        bail!("--password is required when creating a user");
                    }
                    print_json(&accounts.create_user(&args.into()).await?)?;
                }
                UserCommand::Update { id, user } => {
                    print_json(&accounts.update_user(id, &user.into()).await?)?;
                }
                UserCommand::Delete { id } => {
                    let acting = claims.as_ref().and_then(|c| c.user_id);
                    accounts.delete_user(id, acting).await?;
                }
            }
        }

        Command::Approvals(cmd) => {
            require(role, role.can_manage_academics(), "review registrations")?;
            let accounts = AccountsService::new(api);
            match cmd {
                ApprovalCommand::Pending => print_json(&accounts.pending_users().await?)?,
                ApprovalCommand::Set { email, action } => {
                    accounts.set_approval(&email, action).await?
                }
                ApprovalCommand::Feedback { email, message } => {
                    accounts.send_feedback(&email, &message).await?
                }
            }
        }

        Command::Assign(cmd) => {
            require(role, role.can_manage_academics(), "assign teachers")?;
            let academics = AcademicsService::new(api);
            match cmd {
                AssignmentCommand::List => {
                    print_json(&academics.list_assignments(&AssignmentFilter::default()).await?)?
                }
                AssignmentCommand::Add {
                    teacher,
                    class,
                    subject,
                } => {
                    let request = AssignTeacherRequest {
                        teacher,
                        class_instance: class,
                        subject,
                    };
                    academics.assign_teacher(&request).await?;
                }
                AssignmentCommand::Remove { id } => {
                    academics.remove_assignment(ClassSubjectId(id)).await?
                }
            }
        }

        Command::Enroll(cmd) => {
            require(role, role.can_manage_academics(), "manage enrollments")?;
            let academics = AcademicsService::new(api);
            match cmd {
                EnrollmentCommand::List => {
                    print_json(&academics.list_enrollments(&EnrollmentFilter::default()).await?)?
                }
                EnrollmentCommand::Add { student, class } => {
                    let request = EnrollRequest {
                        student,
                        enrolled_class: class,
                    };
                    academics.enroll(&request).await?;
                }
                EnrollmentCommand::Remove { id } => academics.remove_enrollment(id).await?,
            }
        }

        Command::Records {
            class_id,
            subject_id,
            date,
            status,
            search: term,
            page,
        } => {
            let records = RecordsService::new(api);
            let fetched = if role.can_view_student_records() {
                let source = RecordsSource::for_role(role)
                    .context("No records source for this role")?;
                let filter = RecordsFilter {
                    class_id,
                    subject_id,
                    date,
                    status,
                    ..Default::default()
                };
                records.fetch(source, &filter).await?
            } else if role.can_view_own_attendance() {
                let email = claims
                    .as_ref()
                    .and_then(|c| c.email.clone())
                    .context("Access token carries no email")?;
                vec![records.own_record(&email).await?]
            } else {
                bail!("Log in to view attendance records");
            };

            for student in search(&fetched, term.as_deref().unwrap_or("")) {
                println!(
                    "{} ({})",
                    student.name.as_deref().unwrap_or("Unknown"),
                    student.roll_number.as_deref().unwrap_or("-")
                );
                for (subject, stats) in summarize_by_subject(&student.attendance) {
                    println!(
                        "  {:<36} present {:>3}  absent {:>3}  {:>3}% {:?}",
                        subject,
                        stats.present,
                        stats.absent,
                        stats.percent(),
                        stats.tier()
                    );
                }
                let rows = paginate(&student.attendance, page);
                for entry in rows.items {
                    println!(
                        "    {}  {:<36} {:<15} {}",
                        entry.date.map_or_else(|| "-".to_string(), |d| d.to_string()),
                        entry.subject_label(),
                        entry.entry_status.as_deref().unwrap_or("-"),
                        entry.exit_status.as_deref().unwrap_or("-"),
                    );
                }
                println!("    page {}/{}", rows.number, rows.total_pages);
            }
        }

        Command::Overview => {
            require(role, role.can_manage_academics(), "view the admin overview")?;
            let stats = DashboardService::new(api).admin_overview().await?;
            println!("Users:             {}", stats.users);
            println!("Teachers:          {}", stats.teachers);
            println!("Students:          {}", stats.students);
            println!("Classes:           {}", stats.classes);
            println!("Subjects:          {}", stats.subjects);
            println!("Enrollments:       {}", stats.enrollments);
            println!("Assignments:       {}", stats.assignments);
            println!("Pending approvals: {}", stats.pending_approvals);
        }

        Command::Register(args) => {
            let form = RegistrationForm {
                full_name: args.name,
                email: args.email,
                password: args.password,
                confirm_password: args.confirm_password,
                role: args.role,
                photo: Some(Photo::from_file(&args.photo)?),
                semester: args.semester,
                section: args.section,
                department: args.department,
                roll_number: args.roll_number,
            };
            let user = AccountsService::new(api).register(form, args.update).await?;
            println!(
                "Registered {} ({}), status: {:?}",
                user.display_name(),
                user.role,
                user.approval_status
            );
        }
    }

    Ok(())
}

fn require(role: Role, allowed: bool, action: &str) -> Result<()> {
    if !allowed {
        bail!("Role '{}' may not {}", role, action);
    }
    Ok(())
}

async fn controller(
    api: &Arc<ApiClient>,
    settings: &ClientSettings,
    args: &SessionArgs,
) -> AttendanceController {
    let controller = AttendanceController::new(
        Arc::clone(api),
        ClassSubjectId(args.class_subject),
        args.title.clone(),
        settings.capture.clone(),
    );
    controller.set_manual_allowed(!args.no_manual).await;
    controller
}

async fn print_notice(controller: &AttendanceController) {
    if let Some(notice) = controller.notice().await {
        println!("[{:?}] {}", notice.kind, notice.message);
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
