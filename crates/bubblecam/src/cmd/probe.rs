use bubblecam_session::Session;
use tracing::debug;

use crate::cmd::ProbeArgs;
use crate::exit::{session_error, CliResult, SUCCESS};
use crate::output::{print_probe, OutputFormat, ProbeOutput};

pub fn run(args: ProbeArgs, format: OutputFormat) -> CliResult<i32> {
    let config = args.camera.to_config()?;
    let (host, channel, stream) = (config.host.clone(), config.channel, config.stream);

    let (session, _streams) =
        Session::open(config).map_err(|err| session_error("probe failed", err))?;

    let out = ProbeOutput {
        host,
        peer: session.peer_addr().to_string(),
        greeting: session.greeting().to_string(),
        channel,
        stream,
        connected: true,
    };
    session.stop();
    debug!("probe stream closed");

    print_probe(&out, format);
    Ok(SUCCESS)
}
