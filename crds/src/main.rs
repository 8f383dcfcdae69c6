use clap::{arg, Command, ValueEnum};
use crds::{HttpProxy, Route, VirtualService};
use kube::CustomResourceExt;

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum Crd {
    #[clap(alias = "routes")]
    Route,
    #[clap(alias = "virtualservice", alias = "virtualService", alias = "vs")]
    VirtualService,
    #[clap(alias = "httpproxy", alias = "httpProxy", alias = "HTTPProxy")]
    HttpProxy,
}

fn cli() -> Command {
    Command::new("routecontroller-crd")
        .about("Route controller command line interface for printing CRD's")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("print").about("Print a CRD").arg(
                arg!(<CRD>)
                    .value_parser(clap::value_parser!(Crd))
                    .required(true),
            ),
        )
}

fn main() -> Result<(), serde_yml::Error> {
    let matches = cli().get_matches();

    match matches.subcommand() {
        Some(("print", sub_matches)) => {
            let crd = match sub_matches.get_one::<Crd>("CRD") {
                Some(Crd::Route) => Route::crd(),
                Some(Crd::VirtualService) => VirtualService::crd(),
                Some(Crd::HttpProxy) => HttpProxy::crd(),
                None => unreachable!("CRD is a required argument"),
            };
            println!("{}", serde_yml::to_string(&crd)?);
        }
        _ => unreachable!(),
    }
    Ok(())
}
