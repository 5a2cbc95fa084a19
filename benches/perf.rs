use std::collections::BTreeMap;

use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use footy_xref::cascade::{Heuristic, Matcher};
use footy_xref::normalize::normalize;
use footy_xref::record::{NormalizedRecord, SourceTag};
use footy_xref::roster::ClubRoster;
use footy_xref::similarity::{WeightedRatio, weighted_ratio};

const SOURCES: [SourceTag; 4] = [
    SourceTag::Fotmob,
    SourceTag::Sofascore,
    SourceTag::Fbref,
    SourceTag::Understat,
];

const FIRST: &[&str] = &[
    "Bukayo", "Martin", "Gabriel", "William", "Declan", "Kai", "Leandro", "Jurrien", "David",
    "Ben", "Oleksandr", "Thomas", "Jakub", "Riccardo", "Mikel", "Ethan",
];
const LAST: &[&str] = &[
    "Saka", "Ødegaard", "Magalhães", "Saliba", "Rice", "Havertz", "Trossard", "Timber", "Raya",
    "White", "Zinchenko", "Partey", "Kiwior", "Calafiori", "Merino", "Nwaneri",
];

fn spelled(source: SourceTag, first: &str, last: &str) -> String {
    match source {
        SourceTag::Sofascore => format!("{} {last}", &first[..1]),
        SourceTag::Understat => format!("{last}, {first}"),
        _ => format!("{first} {last}"),
    }
}

fn synthetic_roster() -> ClubRoster {
    let mut residual = BTreeMap::new();
    for source in SOURCES {
        let mut list = Vec::new();
        for (i, first) in FIRST.iter().enumerate() {
            for (j, last) in LAST.iter().enumerate().skip(i % 4).step_by(4) {
                let name = spelled(source, first, last);
                list.push(NormalizedRecord::new(
                    source,
                    name,
                    format!("{i}-{j}"),
                    "Arsenal",
                    "https://example.test",
                ));
            }
        }
        if source != SourceTag::Fotmob {
            list.reverse();
        }
        residual.insert(source, list);
    }
    ClubRoster {
        club: "Arsenal".to_string(),
        residual,
    }
}

fn bench_normalize(c: &mut Criterion) {
    let names = [
        "Martin Ødegaard",
        "Gabriel dos Santos Magalhães",
        "N'Golo Kanté",
        "Wojciech Szczęsny",
        "Son Heung-min",
    ];
    c.bench_function("normalize", |b| {
        b.iter(|| {
            for name in names {
                black_box(normalize(black_box(name)));
            }
        });
    });
}

fn bench_weighted_ratio(c: &mut Criterion) {
    let pairs = [
        ("son heung min", "heung min son"),
        ("gabriel magalhaes", "gabriel"),
        ("richarlison", "richarlison de andrade"),
        ("paris saint germain", "psg"),
    ];
    c.bench_function("weighted_ratio", |b| {
        b.iter(|| {
            for (a, z) in pairs {
                black_box(weighted_ratio(black_box(a), black_box(z)));
            }
        });
    });
}

fn bench_club_cascade(c: &mut Criterion) {
    let roster = synthetic_roster();
    let matcher = Matcher {
        scorer: &WeightedRatio,
        cutoff: 80,
    };
    c.bench_function("club_cascade_sync", |b| {
        b.iter(|| {
            let mut cascade = roster.cascade(SourceTag::Fotmob, &SOURCES);
            cascade.run_sync(&Heuristic::PLAYER_SYNC_PLAN, matcher);
            black_box(cascade.finish().rows.len());
        });
    });
}

criterion_group!(perf, bench_normalize, bench_weighted_ratio, bench_club_cascade);
criterion_main!(perf);
