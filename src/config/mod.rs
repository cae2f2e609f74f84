// Settings file handling and option merging
mod share_config;

pub use share_config::{
    build_config,
    default_config_path,
    load_settings,
    read_config_file,
    validate_config,
    verify_and_build_config,
    write_config_template,
    ConfigOverrides,
    FileSettings,
    ShareConfig,
};
