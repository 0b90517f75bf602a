use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "tinyimg",
    about = "Compress PNG, JPEG and WebP images with the TinyIMG service",
    long_about = "tinyimg uploads images to a TinyIMG compression service, converts them into \
                  any mix of PNG, JPEG and WebP, reports the savings per file and downloads \
                  the results one by one or as a single zip archive.",
    version,
    after_help = "EXAMPLES:\n  \
    tinyimg compress photo.jpg\n  \
    tinyimg compress ./images -r -f png,webp --download-all -o ./out\n  \
    tinyimg compress \"./shots/*.png\" --all-formats --save-each\n  \
    tinyimg stats\n  \
    tinyimg feedback -s \"Great tool\" -m \"Saved me 3MB\""
)]
pub struct Args {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(ClapArgs)]
pub struct GlobalArgs {
    #[arg(
        long,
        global = true,
        help = "Path to a JSON config file",
        long_help = "Path to a JSON config file. Defaults to ~/.tinyimg/config.json when present."
    )]
    pub config: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        env = "TINYIMG_API_URL",
        help = "Base URL of the compression service"
    )]
    pub api_url: Option<String>,

    #[arg(
        long,
        global = true,
        env = "TINYIMG_SITE_URL",
        help = "Base URL of the site serving stats and feedback"
    )]
    pub site_url: Option<String>,

    #[arg(short = 'q', long, global = true, help = "Only print errors")]
    pub quiet: bool,

    #[arg(short = 'v', long, global = true, help = "Print diagnostic details")]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(
        about = "Compress one batch of images",
        long_about = "Upload every image found in the inputs, one request per file, and print \
                      the result for each requested format. Files larger than 10 MiB are \
                      skipped. Without --formats each image is compressed in its own format."
    )]
    Compress {
        #[arg(
            required = true,
            help = "Image files, directories or glob patterns",
            long_help = "Inputs can be image files, directories or glob expressions. \
                         Only png, jpg, jpeg and webp files are picked up."
        )]
        inputs: Vec<String>,

        #[arg(
            short = 'f',
            long,
            conflicts_with = "all_formats",
            help = "Output formats, comma separated (png, jpg, webp)"
        )]
        formats: Option<String>,

        #[arg(short = 'a', long, help = "Produce png, jpg and webp for every image")]
        all_formats: bool,

        #[arg(
            short = 'o',
            long,
            help = "Directory for downloaded files",
            long_help = "Directory where images.zip and individual artifacts are saved. \
                         Defaults to the configured output directory."
        )]
        output: Option<PathBuf>,

        #[arg(short = 'r', long, help = "Process subdirectories recursively")]
        recursive: bool,

        #[arg(long, help = "Download every result as images.zip once the batch completes")]
        download_all: bool,

        #[arg(long, help = "Download each result as a separate file")]
        save_each: bool,

        #[arg(long, help = "Do not report savings to the public stats counter")]
        no_stats: bool,
    },

    #[command(about = "Show how many files and bytes the service has saved")]
    Stats,

    #[command(about = "Send feedback to the TinyIMG team")]
    Feedback {
        #[arg(short = 's', long, help = "Feedback subject")]
        subject: String,

        #[arg(short = 'm', long, help = "Feedback message")]
        message: String,
    },
}
