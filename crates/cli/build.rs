use std::{env, fs, path::PathBuf};

fn data_dir_arg() -> clap::Arg {
    clap::arg!(--data_dir <DIR> "Directory holding the dataset")
        .global(true)
        .value_parser(clap::value_parser!(PathBuf))
}

fn kind_arg() -> clap::Arg {
    clap::arg!(--kind <KIND> "Collection (posts, comments, profiles)").value_parser(["posts", "comments", "profiles"])
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=OUT_DIR");

    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    let completions_dir = out_dir.join("completions");

    fs::create_dir_all(&completions_dir).unwrap();

    let harvest = clap::Command::new("harvest")
        .about("Harvest saved feed pages into the dataset")
        .arg(clap::arg!(<PAGE> ... "Feed pages in scroll order: URLs, local HTML files, or '-' for stdin"))
        .arg(
            clap::arg!(--detail <KEY_PAGE> "Detail page opened by links to KEY")
                .value_name("KEY=PAGE")
                .action(clap::ArgAction::Append),
        )
        .arg(clap::arg!(--dismiss <SELECTOR> "Selector of the elements that close a detail page"))
        .arg(clap::arg!(--locators <NAME> "Named locator set to overlay on the built-in locators"))
        .arg(
            clap::arg!(--locator_file <FILE> "Locator file to overlay on the built-in locators")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(clap::arg!(--max_posts <N> "Stop after this many posts"))
        .arg(clap::arg!(--scroll_delay <MS> "Delay after each scroll in milliseconds"))
        .arg(clap::arg!(--no_settle "Skip the settle delays after clicks"))
        .arg(clap::arg!(--no_posts "Do not store posts"))
        .arg(clap::arg!(--no_comments "Do not expand or store comments"))
        .arg(clap::arg!(--no_profiles "Do not store author profiles"))
        .arg(clap::arg!(--save_settings "Save the resulting settings as the new defaults"))
        .arg(clap::arg!(--timeout <SECS> "HTTP timeout in seconds").default_value("30"))
        .arg(clap::arg!(--user_agent <UA> "Custom User-Agent for HTTP requests"));

    let stats = clap::Command::new("stats")
        .about("Show storage statistics and analytics")
        .arg(clap::arg!(--json "Print the analytics snapshot as JSON"))
        .arg(clap::arg!(--daily "Include the per-day table"))
        .arg(clap::arg!(--window <DAYS> "Days in the daily activity window").default_value("30"))
        .arg(clap::arg!(--top <N> "Length of the top author and commentator lists").default_value("10"));

    let export = clap::Command::new("export")
        .about("Export the dataset as JSON or CSV")
        .arg(clap::arg!(-f --format <FORMAT> "Output format").value_parser(["json", "csv"]).default_value("json"))
        .arg(kind_arg().default_value("posts"))
        .arg(clap::arg!(-o --output <FILE> "Output file (default: stdout)").value_parser(clap::value_parser!(PathBuf)));

    let search = clap::Command::new("search")
        .about("Search the dataset")
        .arg(clap::arg!([QUERY] "Text to look for, case-insensitive"))
        .arg(kind_arg())
        .arg(clap::arg!(--author <NAME> "Author name substring"))
        .arg(clap::arg!(--from <DATE> "Earliest date"))
        .arg(clap::arg!(--to <DATE> "Latest date"))
        .arg(clap::arg!(--min_reactions <N> "Minimum reactions (posts only)"))
        .arg(clap::arg!(--json "Print matches as JSON"));

    let mut cmd = clap::Command::new("feedharvest")
        .version(env!("CARGO_PKG_VERSION"))
        .author("feedharvest contributors")
        .about("Harvest posts, comments and replies from saved feed pages")
        .arg(data_dir_arg())
        .arg(clap::arg!(-v --verbose "Enable debug logging").global(true))
        .subcommand_required(true)
        .subcommand(harvest)
        .subcommand(stats)
        .subcommand(export)
        .subcommand(search)
        .subcommand(clap::Command::new("clear").about("Remove every stored record and the stored analytics"));

    clap_complete::generate_to(clap_complete::shells::Bash, &mut cmd, "feedharvest", &completions_dir).unwrap();
    clap_complete::generate_to(clap_complete::shells::Zsh, &mut cmd, "feedharvest", &completions_dir).unwrap();
    clap_complete::generate_to(clap_complete::shells::Fish, &mut cmd, "feedharvest", &completions_dir).unwrap();
    clap_complete::generate_to(clap_complete::shells::PowerShell, &mut cmd, "feedharvest", &completions_dir).unwrap();

    println!(
        "cargo:warning=Shell completions generated in: {}",
        completions_dir.display()
    );
}
