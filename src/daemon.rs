use std::path::Path;

#[cfg(unix)]
pub fn daemonize(pid_file: &Path, user: Option<&str>, group: Option<&str>) -> anyhow::Result<()> {
    use daemonize::Daemonize;

    eprintln!("[INFO] Starting daemon mode...");

    let mut daemonize = Daemonize::new()
        .pid_file(pid_file)
        .chown_pid_file(true)
        .working_directory(".")
        .umask(0o027);
    if let Some(user) = user {
        daemonize = daemonize.user(user);
    }
    if let Some(group) = group {
        daemonize = daemonize.group(group);
    }

    match daemonize.start() {
        Ok(_) => Ok(()),
        Err(e) => {
            eprintln!("[ERROR] Daemon startup: {}", e);
            Err(anyhow::anyhow!("Failed to start daemon mode"))
        }
    }
}

#[cfg(not(unix))]
pub fn daemonize(_pid_file: &Path, _user: Option<&str>, _group: Option<&str>) -> anyhow::Result<()> {
    eprintln!("[INFO] Daemon mode not supported on this platform, staying in foreground");
    Ok(())
}
