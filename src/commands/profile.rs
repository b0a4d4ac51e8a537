//! # profile 命令实现
//!
//! 远程配置文件的增删查，以及作业脚本预览。
//!
//! ## 依赖关系
//! - 使用 `cli/profile.rs` 定义的参数
//! - 使用 `models/profile.rs`, `pipeline/command.rs`, `remote/script.rs`, `utils/output.rs`

use crate::cli::profile::{AddProfileArgs, ProfileArgs, ProfileCommands};
use crate::error::Result;
use crate::models::{ProfileRegistry, RemoteProfile};
use crate::pipeline::{build_command, CommandKind};
use crate::remote::script;
use crate::utils::output;

use std::path::Path;
use tabled::{Table, Tabled};

/// 配置列表行
#[derive(Debug, Clone, Tabled)]
struct ProfileRow {
    #[tabled(rename = "Title")]
    title: String,
    #[tabled(rename = "Host")]
    host: String,
    #[tabled(rename = "User")]
    user: String,
    #[tabled(rename = "Port")]
    port: u16,
    #[tabled(rename = "Auth")]
    auth: String,
    #[tabled(rename = "Submit")]
    job_command: String,
}

/// 执行 profile 命令
pub fn execute(args: ProfileArgs) -> Result<()> {
    let path = args.profiles.as_path();
    match args.command {
        ProfileCommands::List => list(path),
        ProfileCommands::Show { title } => show(path, &title),
        ProfileCommands::Add(add_args) => add(path, add_args),
        ProfileCommands::Remove { title } => remove(path, &title),
        ProfileCommands::Render {
            title,
            np,
            nthreads,
        } => render(path, &title, np, nthreads),
    }
}

fn list(path: &Path) -> Result<()> {
    let registry = ProfileRegistry::load(path)?;
    if registry.profiles().is_empty() {
        output::print_info(&format!("No profiles in '{}'", path.display()));
        return Ok(());
    }

    let rows: Vec<ProfileRow> = registry.profiles().iter().map(profile_row).collect();
    println!("{}", Table::new(&rows));
    Ok(())
}

fn show(path: &Path, title: &str) -> Result<()> {
    let registry = ProfileRegistry::load(path)?;
    let profile = registry.get(title)?;

    output::print_header(&format!("Profile '{}'", profile));
    let field = output::print_field;
    field("host", profile.host.as_deref());
    field("port", Some(&profile.port_number().to_string()));
    field("user", profile.user.as_deref());
    field("key", profile.key_path.as_deref());
    field("password", profile.password.as_ref().map(|_| "********"));
    field("work directory", profile.work_directory.as_deref());
    field("job command", Some(&profile.job_command));

    if let Some(modules) = profile.module_commands.as_deref() {
        output::print_separator();
        println!("{}", modules);
    }
    output::print_separator();
    println!("{}", profile.job_script);
    Ok(())
}

fn add(path: &Path, args: AddProfileArgs) -> Result<()> {
    let mut registry = ProfileRegistry::load(path)?;
    let profile = build_profile(args)?;
    let title = profile.title().to_string();

    registry.add(profile)?;
    registry.save(path)?;
    output::print_success(&format!("Added profile '{}' to '{}'", title, path.display()));
    Ok(())
}

fn remove(path: &Path, title: &str) -> Result<()> {
    let mut registry = ProfileRegistry::load(path)?;
    registry.remove(title)?;
    registry.save(path)?;
    output::print_success(&format!("Removed profile '{}'", title));
    Ok(())
}

fn render(path: &Path, title: &str, np: i64, nthreads: i64) -> Result<()> {
    let registry = ProfileRegistry::load(path)?;
    let profile = registry.get(title)?;

    let script = render_sample(profile, np, nthreads)?;
    output::print_header(&format!("Job Script of '{}'", profile));
    println!("{}", script);
    output::print_separator();
    output::print_info(&format!("Submit: {}", sample_job_command(profile, &script)));
    Ok(())
}

/// 用一条示例 pw.x 命令渲染作业脚本
fn render_sample(profile: &RemoteProfile, np: i64, nthreads: i64) -> Result<String> {
    let command = build_command(CommandKind::PwScf, "espresso.scf.in", np)?.join(" ");
    Ok(profile.render_job_script(&[command], np, nthreads))
}

/// 预览用提交命令，脚本名与实际写出的文件一致
fn sample_job_command(profile: &RemoteProfile, script: &str) -> String {
    profile.render_job_command(&script::job_script_name("espresso", script))
}

fn build_profile(args: AddProfileArgs) -> Result<RemoteProfile> {
    let mut profile = RemoteProfile::with_scheduler(&args.title, args.scheduler.into())?;
    profile.host = Some(args.host);
    profile.user = Some(args.user);
    profile.port = Some(args.port.to_string());
    profile.key_path = args.key.map(|k| k.display().to_string());
    profile.password = args.password;
    profile.work_directory = args.workdir;
    profile.module_commands = args.modules;
    Ok(profile)
}

fn profile_row(profile: &RemoteProfile) -> ProfileRow {
    let auth = match (&profile.key_path, &profile.password) {
        (Some(_), Some(_)) => "key+password",
        (Some(_), None) => "key",
        (None, Some(_)) => "password",
        (None, None) => "agent",
    };
    ProfileRow {
        title: profile.title().to_string(),
        host: profile.host.clone().unwrap_or_default(),
        user: profile.user.clone().unwrap_or_default(),
        port: profile.port_number(),
        auth: auth.to_string(),
        job_command: profile.job_command.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::profile::SchedulerArg;
    use crate::error::QeRemoteError;

    fn add_args(title: &str) -> AddProfileArgs {
        AddProfileArgs {
            title: title.to_string(),
            host: "login.hpc".to_string(),
            user: "me".to_string(),
            port: 2222,
            key: None,
            password: Some("secret".to_string()),
            workdir: Some("/scratch/me".to_string()),
            modules: Some("module load qe".to_string()),
            scheduler: SchedulerArg::Slurm,
        }
    }

    #[test]
    fn test_add_and_remove() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("profiles.json");

        add(&path, add_args("hpc")).unwrap();
        let result = add(&path, add_args("hpc"));
        assert!(matches!(result, Err(QeRemoteError::DuplicateProfile { .. })));

        let registry = ProfileRegistry::load(&path).unwrap();
        let profile = registry.get("hpc").unwrap();
        assert_eq!(profile.port_number(), 2222);
        assert_eq!(profile.job_command, "sbatch ${JOB_SCRIPT}");

        let row = profile_row(profile);
        assert_eq!(row.auth, "password");

        remove(&path, "hpc").unwrap();
        assert!(ProfileRegistry::load(&path).unwrap().profiles().is_empty());
        assert!(matches!(
            remove(&path, "hpc"),
            Err(QeRemoteError::ProfileNotFound { .. })
        ));
    }

    #[test]
    fn test_render_sample() {
        let profile = build_profile(add_args("hpc")).unwrap();
        let script = render_sample(&profile, 4, 2).unwrap();

        assert!(script.starts_with("#!/bin/bash"));
        assert!(script.contains("mpirun -np 4 pw.x -in espresso.scf.in"));
        assert!(script.contains("module load qe"));
    }

    #[test]
    fn test_sample_job_command_follows_shebang() {
        let mut profile = build_profile(add_args("hpc")).unwrap();
        profile.job_script = "#!/bin/csh\n${QUANTUM_ESPRESSO_COMMAND}\n".to_string();

        let script = render_sample(&profile, 1, 1).unwrap();
        assert_eq!(sample_job_command(&profile, &script), "sbatch espresso.csh");
    }

    #[test]
    fn test_empty_title_rejected() {
        let result = build_profile(add_args("  "));
        assert!(matches!(result, Err(QeRemoteError::EmptyProfileTitle)));
    }
}
