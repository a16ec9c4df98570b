use chrono::NaiveDate;
use clap::{Parser, ValueEnum};
use color_eyre::{eyre::eyre, Result};
use std::fmt::Display;
use std::path::PathBuf;
use url::Url;

use finboard::backend::PocketBaseClient;
use finboard::config::Config;
use finboard::dashboard::{Dashboard, PageView};
use finboard::entities::{Budget, Category, MonthlyBalance, PaymentMethod, Subscription, Transaction};
use finboard::filter::{compile, FieldMap, FilterSpec};
use finboard::logging;
use finboard::pagination::{last_page, UrlBinding};

#[derive(Parser, Debug)]
#[command(name = "finboard")]
#[command(about = "Browse personal-finance records from the command line")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/finboard/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Page address carrying the `page` and `rpp` parameters
  #[arg(long)]
  url: Option<Url>,

  /// Collection to show
  #[arg(value_enum)]
  entity: EntityKind,

  /// Earliest date, yyyy-MM-dd
  #[arg(long)]
  from: Option<NaiveDate>,

  /// Latest date, yyyy-MM-dd
  #[arg(long)]
  to: Option<NaiveDate>,

  /// Category id (repeatable)
  #[arg(long = "category")]
  categories: Vec<String>,

  /// Payment method id (repeatable)
  #[arg(long = "payment-method")]
  payment_methods: Vec<String>,

  #[arg(long)]
  price_from: Option<f64>,

  #[arg(long)]
  price_to: Option<f64>,

  /// Text searched in receiver and information, on the backend
  #[arg(long)]
  keyword: Option<String>,

  /// Text searched in receiver and information, in the loaded rows only
  #[arg(long)]
  search: Option<String>,

  /// Print the compiled backend filter and exit
  #[arg(long)]
  print_query: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum EntityKind {
  Transactions,
  Subscriptions,
  Categories,
  PaymentMethods,
  Budgets,
  MonthlyBalances,
}

impl EntityKind {
  fn field_map(self) -> Option<FieldMap> {
    match self {
      EntityKind::Transactions => Some(FieldMap::transactions()),
      EntityKind::Subscriptions => Some(FieldMap::subscriptions()),
      _ => None,
    }
  }

  fn path(self) -> &'static str {
    match self {
      EntityKind::Transactions => "transactions",
      EntityKind::Subscriptions => "subscriptions",
      EntityKind::Categories => "categories",
      EntityKind::PaymentMethods => "payment-methods",
      EntityKind::Budgets => "budgets",
      EntityKind::MonthlyBalances => "monthly-balances",
    }
  }
}

impl Args {
  fn filter(&self) -> FilterSpec {
    FilterSpec {
      start_date: self.from,
      end_date: self.to,
      categories: Some(self.categories.clone()),
      payment_methods: Some(self.payment_methods.clone()),
      price_from: self.price_from,
      price_to: self.price_to,
      keyword: self.keyword.clone(),
    }
  }
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let filter = args.filter();

  let fields = args.entity.field_map();
  if fields.is_none() && (!filter.is_empty() || args.search.is_some()) {
    return Err(eyre!("{} cannot be filtered", args.entity.path()));
  }

  if args.print_query {
    let query = fields
      .map(|fields| compile(&filter, &fields))
      .unwrap_or_default();
    println!("{}", query);
    return Ok(());
  }

  let config = Config::load(args.config.as_deref())?;

  let log_dir = config
    .log_dir
    .clone()
    .or_else(logging::default_log_dir)
    .ok_or_else(|| eyre!("No log directory available; set log_dir in the config file"))?;
  let _log_guard = logging::init(&log_dir)?;

  let client = PocketBaseClient::new(&config.backend)?;
  let board = Dashboard::new(client, UrlBinding::new(config.pagination()?));
  board
    .sign_in(&config.backend.email, &Config::get_password()?)
    .await?;

  let url = match &args.url {
    Some(url) => url.clone(),
    None => Url::parse(&format!("finboard://local/{}", args.entity.path()))?,
  };
  let search = args.search.as_deref();

  match args.entity {
    EntityKind::Transactions => show(board.page::<Transaction>(&filter, search, &url).await),
    EntityKind::Subscriptions => show(board.page::<Subscription>(&filter, search, &url).await),
    EntityKind::Categories => show(board.browse::<Category>(&url).await),
    EntityKind::PaymentMethods => show(board.browse::<PaymentMethod>(&url).await),
    EntityKind::Budgets => show(board.browse::<Budget>(&url).await),
    EntityKind::MonthlyBalances => show(board.browse::<MonthlyBalance>(&url).await),
  }
}

fn show<T: Display>(view: PageView<T>) -> Result<()> {
  if let Some(error) = view.error {
    return Err(eyre!(error));
  }
  if let Some(rewrite) = &view.rewrite {
    eprintln!("{}", rewrite);
  }

  for row in &view.rows {
    println!("{}", row);
  }
  println!(
    "-- page {} of {} ({} rows)",
    view.state.page + 1,
    last_page(view.total, view.state.rows_per_page) + 1,
    view.total
  );
  Ok(())
}
