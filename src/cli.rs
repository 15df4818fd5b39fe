use clap::{arg,crate_version,ArgAction,Command,ValueHint};

pub fn build_cli() -> Command {
    let long_help = "dfkit is always invoked with exactly one of several subcommands.
All analysis is strictly read-only; nothing is ever written to the image.
Set RUST_LOG environment variable to control logging level.
  levels: trace,debug,info,warn,error

Examples:
---------
list partitions:        `dfkit scan -f disk.img`
print mount plans:      `dfkit mount -f disk.img`
list a FAT root:        `dfkit catalog -f disk.img -o 2048`
undelete from cluster:  `dfkit recover -f disk.img -o 2048 -c 1803 -d out`
show an MFT entry:      `dfkit record -f disk.img -o 206848 -e 5`
extract an MFT entry:   `dfkit extract -f disk.img -o 206848 -e 5 -d out`
MAC-time CSV:           `dfkit timeline -m mft.bin > times.csv`
hunt for JPEGs:         `dfkit carve -f disk.img -s jpeg,png -c 8`";
    let search_types = "jpeg,jpg,png,gif,bmp,img,image,pdf,exe,zip,doc,word,xls,excel,ppt,powerpoint,ofc,office";

    let mut main_cmd = Command::new("dfkit")
        .about("Analyzes raw disk images: partitions, FAT, NTFS.")
        .after_long_help(long_help)
        .version(crate_version!());

    main_cmd = main_cmd.subcommand(
        Command::new("scan")
            .arg(arg!(-f --file <PATH> "path to the raw image file").value_hint(ValueHint::FilePath).required(true))
            .arg(arg!(--json "output as a JSON string").action(ArgAction::SetTrue))
            .about("identify the partition scheme and list partitions"),
    );
    main_cmd = main_cmd.subcommand(
        Command::new("mount")
            .arg(arg!(-f --file <PATH> "path to the raw image file").value_hint(ValueHint::FilePath).required(true))
            .about("print loopback mount plans for mountable partitions"),
    );
    main_cmd = main_cmd.subcommand(
        Command::new("catalog")
            .arg(arg!(-f --file <PATH> "path to the raw image file").value_hint(ValueHint::FilePath).required(true))
            .arg(arg!(-o --offset <SECTORS> "offset to the volume in sectors").required(false).default_value("0"))
            .arg(arg!(-c --cluster <CLUSTER> "first cluster of the directory, omit for root").required(false))
            .visible_alias("ls")
            .visible_alias("dir")
            .about("list a directory on a FAT volume"),
    );
    main_cmd = main_cmd.subcommand(
        Command::new("recover")
            .arg(arg!(-f --file <PATH> "path to the raw image file").value_hint(ValueHint::FilePath).required(true))
            .arg(arg!(-o --offset <SECTORS> "offset to the volume in sectors").required(false).default_value("0"))
            .arg(arg!(-c --cluster <CLUSTER> "first cluster of the directory, omit for root").required(false).default_value("0"))
            .arg(arg!(-d --dir <PATH> "output directory").value_hint(ValueHint::DirPath).required(false).default_value("."))
            .arg(arg!(--hiword <N> "FAT32 start-cluster high word guess").required(false))
            .arg(
                arg!(--strategy <STRATEGY> "FAT32 high word search strategy")
                    .required(false)
                    .value_parser(["hint","next","all"])
                    .default_value("all"),
            )
            .arg(arg!(--"keep-zero-clusters" "do not veto chains containing all-zero clusters").action(ArgAction::SetTrue))
            .arg(arg!(--"keep-zero-slack" "do not veto chains whose RAM slack is all zero").action(ArgAction::SetTrue))
            .about("classify and recover deleted files on a FAT volume"),
    );
    main_cmd = main_cmd.subcommand(
        Command::new("record")
            .arg(arg!(-f --file <PATH> "path to the raw image file").value_hint(ValueHint::FilePath).required(true))
            .arg(arg!(-o --offset <SECTORS> "offset to the volume in sectors").required(false).default_value("0"))
            .arg(arg!(-e --entry <N> "MFT entry number").required(false).default_value("0"))
            .arg(arg!(-m --mft <PATH> "pre-extracted MFT file").value_hint(ValueHint::FilePath).required(false))
            .about("pretty-print one NTFS MFT entry"),
    );
    main_cmd = main_cmd.subcommand(
        Command::new("extract")
            .arg(arg!(-f --file <PATH> "path to the raw image file").value_hint(ValueHint::FilePath).required(true))
            .arg(arg!(-o --offset <SECTORS> "offset to the volume in sectors").required(false).default_value("0"))
            .arg(arg!(-e --entry <N> "MFT entry number").required(false).default_value("0"))
            .arg(arg!(-d --dir <PATH> "output directory").value_hint(ValueHint::DirPath).required(false).default_value("."))
            .arg(arg!(-m --mft <PATH> "pre-extracted MFT file, sidesteps MFT fragmentation").value_hint(ValueHint::FilePath).required(false))
            .arg(arg!(-s --slack "include INDX buffer slack in directory extraction").action(ArgAction::SetTrue))
            .about("extract a file or directory from an NTFS volume"),
    );
    main_cmd = main_cmd.subcommand(
        Command::new("timeline")
            .arg(arg!(-m --mft <PATH> "pre-extracted MFT file").value_hint(ValueHint::FilePath).required(true))
            .arg(arg!(-f --file <PATH> "image file, enables index buffer rows").value_hint(ValueHint::FilePath).required(false))
            .arg(arg!(-o --offset <SECTORS> "offset to the volume in sectors").required(false).default_value("0"))
            .about("emit MAC times from an MFT stream as CSV"),
    );
    main_cmd = main_cmd.subcommand(
        Command::new("carve")
            .arg(arg!(-f --file <PATH> "path to the raw image file").value_hint(ValueHint::FilePath).required(true))
            .arg(
                arg!(-s --search <LIST> "comma separated list of things to search for")
                    .required(true)
                    .long_help(format!("comma separated list of things to search for\nvalid keys: {}",search_types)),
            )
            .arg(arg!(-o --offset <SECTORS> "offset to start of search in sectors").required(false).default_value("0"))
            .arg(arg!(-c --cluster <SECTORS> "sectors to search at a time").required(false).default_value("1"))
            .about("search sectors for known file types"),
    );
    main_cmd = main_cmd.subcommand(
        Command::new("chunk")
            .arg(arg!(-f --file <PATH> "path to the raw image file").value_hint(ValueHint::FilePath).required(true))
            .arg(arg!(-o --offset <SECTORS> "offset to the chunk in sectors").required(false).default_value("0"))
            .arg(arg!(-n --count <SECTORS> "sectors to read").required(false).default_value("1"))
            .about("display or pipe raw sectors"),
    );
    main_cmd = main_cmd.subcommand(
        Command::new("completions")
            .arg(
                arg!(-s --shell <SHELL> "shell for which completions are generated")
                    .required(true)
                    .value_parser(["bash","elv","fish","ps1","zsh"]),
            )
            .about("generate shell completions on stdout"),
    );
    main_cmd
}
