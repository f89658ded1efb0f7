use ctx::{background, Background, Ctx};
use std::{thread, time::Duration};

fn main() {
    let bg = background();
    let ctx = bg.with_cancel();

    let ticker_ctx = ctx.to_background();
    let ticker1 = thread::spawn(move || ticker(ticker_ctx, "tick"));

    let ticker_ctx = ctx.to_background();
    let ticker2 = thread::spawn(move || ticker(ticker_ctx, "tock"));

    thread::sleep(Duration::from_millis(550));
    ctx.cancel();

    let ticks1 = ticker1.join().unwrap();
    let ticks2 = ticker2.join().unwrap();
    println!("stopped after {ticks1} + {ticks2} ticks");
}

fn ticker(ctx: Ctx<Background>, label: &str) -> u32 {
    let mut ticks = 0;
    loop {
        println!("{label}");
        ticks += 1;
        if ctx.sleep(Duration::from_millis(100)).is_err() {
            return ticks;
        }
    }
}
