//! Node binary: parses the command line and drives the single-process
//! mining and trading simulation.

use clap::Parser;
use log::{debug, error, info, LevelFilter};
use pocketcoin::core::monetary::{format_amount, BASE_BLOCK_REWARD, SUBUNITS_PER_COIN};
use pocketcoin::roles::SharedChain;
use pocketcoin::utils::crypto::new_key_pair;
use pocketcoin::{Blockchain, Command, Identity, Miner, Opt, User, GLOBAL_SETTINGS};
use rand::Rng;
use std::process;
use std::sync::{Arc, RwLock};
use std::thread;
use std::time::Duration;

fn main() {
    env_logger::builder().filter_level(LevelFilter::Info).init();

    let opt = Opt::parse();

    if let Err(e) = run_command(opt.command) {
        error!("Error: {e}");
        process::exit(1);
    }
}

fn run_command(command: Command) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::Simulate {
            users,
            blocks,
            strategy,
            interval_ms,
            probability,
            window,
            pause_ms,
        } => {
            // Flags override the environment-seeded defaults before anything
            // reads the settings.
            if let Some(count) = users {
                GLOBAL_SETTINGS.set_sim_users(count);
            }
            if let Some(strategy) = strategy {
                GLOBAL_SETTINGS.set_difficulty_strategy(strategy.into());
            }
            if let Some(ms) = interval_ms {
                GLOBAL_SETTINGS.set_target_block_interval_ms(ms);
            }
            if let Some(probability) = probability {
                GLOBAL_SETTINGS.set_difficulty_probability(probability);
            }
            if let Some(window) = window {
                GLOBAL_SETTINGS.set_retarget_window(window);
            }
            if let Some(ms) = pause_ms {
                GLOBAL_SETTINGS.set_mining_pause_ms(ms);
            }
            run_simulation(blocks)
        }
    }
}

/// Boots a ledger, one miner and a crowd of users, then lets them trade at
/// random until the optional block limit is reached.
fn run_simulation(block_limit: Option<u64>) -> Result<(), Box<dyn std::error::Error>> {
    let user_count = GLOBAL_SETTINGS.get_sim_users();
    if user_count < 2 {
        return Err("the simulation needs at least two users to trade".into());
    }

    // The founder key is generated before the chain exists so the genesis
    // reward has an owner. The founder only holds it; trading money enters
    // circulation through the miner's rewards.
    let founder_key = new_key_pair(GLOBAL_SETTINGS.get_rsa_key_bits())?;
    let founder_identity = Identity::from_public_key(&founder_key.to_public_key())?;

    let chain = Blockchain::initialize(&founder_identity, GLOBAL_SETTINGS.build_difficulty())?;
    info!("ledger initialized: {chain}");
    let chain: SharedChain = Arc::new(RwLock::new(chain));

    let miner = Arc::new(Miner::create(Arc::clone(&chain))?);
    info!("miner {} starts working", miner.identity());

    let miner_handle = {
        let miner = Arc::clone(&miner);
        thread::spawn(move || miner.run(block_limit))
    };

    let mut users = Vec::with_capacity(user_count);
    for _ in 0..user_count {
        let user = User::create(Arc::clone(&chain))?;
        info!("user {} joined the simulation", user.identity());
        users.push(user);
    }
    let users = Arc::new(users);

    {
        let chain = Arc::clone(&chain);
        let miner_identity = miner.identity().clone();
        let user_identities: Vec<Identity> = users.iter().map(|u| u.identity().clone()).collect();
        thread::spawn(move || report_status(chain, miner_identity, user_identities));
    }

    info!("trading begins among {user_count} users");
    {
        let chain = Arc::clone(&chain);
        let miner = Arc::clone(&miner);
        let users = Arc::clone(&users);
        thread::spawn(move || trade_at_random(chain, miner, users));
    }

    match block_limit {
        Some(_) => {
            if miner_handle.join().is_err() {
                return Err("the mining thread panicked".into());
            }
            let chain = chain
                .read()
                .expect("Failed to acquire read lock on chain - this should never happen");
            info!("simulation finished with a {}", *chain);
            Ok(())
        }
        // Without a limit the simulation runs until interrupted.
        None => loop {
            thread::sleep(Duration::from_secs(10));
        },
    }
}

/// Logs every account balance once per second.
fn report_status(chain: SharedChain, miner: Identity, users: Vec<Identity>) {
    loop {
        {
            let chain = chain
                .read()
                .expect("Failed to acquire read lock on chain - this should never happen");
            let mut line = format!("{} holds {}", miner, format_amount(chain.balance_of(&miner)));
            for user in &users {
                line.push_str(&format!(
                    ", {} holds {}",
                    user,
                    format_amount(chain.balance_of(user))
                ));
            }
            debug!("account status: {line}");
            debug!("ledger status: {}", *chain);
        }
        thread::sleep(Duration::from_secs(1));
    }
}

/// Posts random transfers between the two halves of the crowd, with the miner
/// occasionally vesting freshly mined coins into it. A sender sits out while
/// its previous transfer is still pooled, so at most one transfer per account
/// is in flight.
fn trade_at_random(chain: SharedChain, miner: Arc<Miner>, users: Arc<Vec<User>>) {
    let mut rng = rand::thread_rng();
    let user_count = users.len();
    let pause = Duration::from_millis(GLOBAL_SETTINGS.get_trading_pause_ms());
    // Trades move less than one coin so early balances last a while.
    let max_amount = BASE_BLOCK_REWARD / SUBUNITS_PER_COIN;

    let mut head = {
        let chain = chain
            .read()
            .expect("Failed to acquire read lock on chain - this should never happen");
        chain.latest_block().get_hash()
    };

    loop {
        let from = rng.gen_range(0..user_count);
        let to = if from < user_count / 2 {
            user_count / 2 + rng.gen_range(0..user_count / 2)
        } else {
            rng.gen_range(0..user_count / 2)
        };

        {
            let chain = chain
                .read()
                .expect("Failed to acquire read lock on chain - this should never happen");
            let latest = chain.latest_block().get_hash();
            if latest != head {
                info!("chain confirmed a new head: {}", chain.latest_block());
                head = latest;
            }
        }

        thread::sleep(pause);

        let amount = rng.gen_range(1..max_amount);
        let fee = rng.gen_range(0..10);
        let banker = miner.as_user();
        if !banker.has_pending_transfer() && banker.balance() > amount {
            banker.send_to(users[to].identity(), amount, fee);
            thread::sleep(Duration::from_secs(1));
        }

        let amount = rng.gen_range(1..max_amount);
        let fee = rng.gen_range(0..user_count as u64);
        if !users[from].has_pending_transfer() && users[from].balance() > amount {
            users[from].send_to(users[to].identity(), amount, fee);
            thread::sleep(Duration::from_secs(1));
        }
    }
}
